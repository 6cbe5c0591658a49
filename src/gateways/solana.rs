//! Solana ledger integration.
//!
//! JSON-RPC client for transaction submission, balance reads, and
//! confirmation polling, plus local ed25519 transaction signing.
//!
//! Serialized transactions are `[shortvec sig-count][64-byte sigs][message]`;
//! signing covers the message bytes and the fee-payer signature occupies
//! slot 0. The swap gateway embeds the fee payer and a recent block
//! reference in the payload it returns; the expiry height travels
//! alongside as `last_valid_block_height`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer as _, SigningKey};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{LedgerGateway, TransactionSigner};
use crate::error::{GatewayError, SwapError};
use crate::types::{to_major_units, ConfirmationStatus, SwapTransaction};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SERVICE_NAME: &str = "solana";

/// Mint address of the native asset (wrapped SOL).
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Minor-unit scale of the native asset (lamports).
const NATIVE_DECIMALS: u32 = 9;

/// Confirmation polling bounds: up to 30 attempts, 2 seconds apart,
/// for a worst-case wait of 60 seconds wall time.
const MAX_CONFIRMATION_ATTEMPTS: u32 = 30;
const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Local ed25519 signer holding the wallet keypair in memory.
pub struct LocalSigner {
    key: SigningKey,
    public_key: String,
}

impl LocalSigner {
    /// Build a signer from a base58-encoded secret: either a 64-byte
    /// keypair (seed followed by public key) or a bare 32-byte seed.
    pub fn from_base58(secret: &SecretString) -> Result<Self> {
        let bytes = bs58::decode(secret.expose_secret())
            .into_vec()
            .context("Wallet keypair is not valid base58")?;

        let seed: [u8; 32] = match bytes.len() {
            64 | 32 => bytes[..32]
                .try_into()
                .context("Wallet keypair seed conversion")?,
            n => anyhow::bail!("Wallet keypair must be 32 or 64 bytes, got {n}"),
        };

        let key = SigningKey::from_bytes(&seed);
        let public_key = bs58::encode(key.verifying_key().as_bytes()).into_string();
        Ok(Self { key, public_key })
    }
}

impl TransactionSigner for LocalSigner {
    fn public_key(&self) -> String {
        self.public_key.clone()
    }

    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SwapError> {
        Ok(self.key.sign(message).to_bytes())
    }
}

/// Decode a shortvec (compact-u16) length prefix. Returns the decoded
/// length and the number of prefix bytes consumed.
fn decode_shortvec_len(bytes: &[u8]) -> Result<(usize, usize), SwapError> {
    let mut len = 0usize;
    let mut size = 0usize;
    loop {
        let byte = *bytes
            .get(size)
            .ok_or_else(|| SwapError::Signing("truncated transaction prefix".to_string()))?;
        len |= ((byte & 0x7f) as usize) << (size * 7);
        size += 1;
        if byte & 0x80 == 0 {
            break;
        }
        if size >= 3 {
            return Err(SwapError::Signing("oversized shortvec prefix".to_string()));
        }
    }
    Ok((len, size))
}

/// Sign a base64 serialized transaction with the fee-payer key,
/// returning the signed transaction re-encoded as base64.
fn sign_transaction(
    signer: &dyn TransactionSigner,
    unsigned_tx_base64: &str,
) -> Result<String, SwapError> {
    let mut bytes = BASE64
        .decode(unsigned_tx_base64)
        .map_err(|e| SwapError::Signing(format!("transaction is not valid base64: {e}")))?;

    let (sig_count, prefix_len) = decode_shortvec_len(&bytes)?;
    if sig_count == 0 {
        return Err(SwapError::Signing(
            "transaction declares no signature slots".to_string(),
        ));
    }

    let message_start = prefix_len + sig_count * 64;
    if bytes.len() <= message_start {
        return Err(SwapError::Signing(
            "transaction shorter than its signature table".to_string(),
        ));
    }

    let signature = signer.sign_message(&bytes[message_start..])?;
    bytes[prefix_len..prefix_len + 64].copy_from_slice(&signature);

    Ok(BASE64.encode(&bytes))
}

// ---------------------------------------------------------------------------
// RPC client
// ---------------------------------------------------------------------------

/// Solana JSON-RPC ledger client.
pub struct SolanaLedger {
    http: Client,
    rpc_url: String,
    signer: Arc<dyn TransactionSigner>,
    request_id: AtomicU64,
}

impl SolanaLedger {
    pub fn new(rpc_url: &str, timeout_secs: u64, signer: Arc<dyn TransactionSigner>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("CASCADE/0.1.0 (swap-execution-engine)")
            .build()
            .context("Failed to build HTTP client for Solana RPC")?;

        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            signer,
            request_id: AtomicU64::new(1),
        })
    }

    /// The wallet public key this client signs and pays fees with.
    pub fn public_key(&self) -> String {
        self.signer.public_key()
    }

    // -- Wire helpers ----------------------------------------------------

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self.http.post(&self.rpc_url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                service: SERVICE_NAME,
                status,
                body,
            });
        }

        let envelope: Value = resp.json().await?;

        if let Some(err) = envelope.get("error") {
            return Err(GatewayError::Rpc {
                code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: format!("{method} response has neither result nor error"),
            })
    }

    /// Submit a signed (base64) transaction. `maxRetries: 0` keeps the RPC
    /// node from resubmitting on its own; an ambiguous outcome must surface
    /// to the caller instead of becoming a duplicate submission.
    async fn submit_transaction(&self, signed_tx_base64: &str) -> Result<String, GatewayError> {
        let result = self
            .rpc(
                "sendTransaction",
                json!([signed_tx_base64, {"encoding": "base64", "skipPreflight": false, "maxRetries": 0}]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: "sendTransaction result is not a signature string".to_string(),
            })
    }

    async fn signature_status(&self, signature: &str) -> Result<ConfirmationStatus, GatewayError> {
        let result = self
            .rpc(
                "getSignatureStatuses",
                json!([[signature], {"searchTransactionHistory": true}]),
            )
            .await?;
        Self::parse_signature_status(&result)
    }

    /// Parse a `getSignatureStatuses` result into a confirmation state.
    fn parse_signature_status(result: &Value) -> Result<ConfirmationStatus, GatewayError> {
        let entry = result
            .get("value")
            .and_then(Value::as_array)
            .and_then(|v| v.first())
            .ok_or_else(|| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: "getSignatureStatuses result has no value array".to_string(),
            })?;

        if entry.is_null() {
            return Ok(ConfirmationStatus::Pending);
        }

        if let Some(err) = entry.get("err") {
            if !err.is_null() {
                return Ok(ConfirmationStatus::Failed(err.to_string()));
            }
        }

        match entry.get("confirmationStatus").and_then(Value::as_str) {
            Some("confirmed") => Ok(ConfirmationStatus::Confirmed),
            Some("finalized") => Ok(ConfirmationStatus::Finalized),
            _ => Ok(ConfirmationStatus::Pending),
        }
    }

    /// Sum token balances from a `getTokenAccountsByOwner` result using
    /// exact fixed-point arithmetic on the raw integer amounts.
    fn parse_token_balance(result: &Value) -> Result<Decimal, GatewayError> {
        let accounts = result
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: "getTokenAccountsByOwner result has no value array".to_string(),
            })?;

        let mut total = Decimal::ZERO;
        for account in accounts {
            let token_amount = account
                .pointer("/account/data/parsed/info/tokenAmount")
                .ok_or_else(|| GatewayError::Malformed {
                    service: SERVICE_NAME,
                    detail: "token account missing tokenAmount".to_string(),
                })?;

            let amount = token_amount
                .get("amount")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i128>().ok())
                .ok_or_else(|| GatewayError::Malformed {
                    service: SERVICE_NAME,
                    detail: "tokenAmount.amount is not an integer string".to_string(),
                })?;
            let decimals = token_amount
                .get("decimals")
                .and_then(Value::as_u64)
                .filter(|d| *d <= 28)
                .ok_or_else(|| GatewayError::Malformed {
                    service: SERVICE_NAME,
                    detail: "tokenAmount.decimals missing or out of range".to_string(),
                })? as u32;

            total += Decimal::from_i128_with_scale(amount, decimals).normalize();
        }

        Ok(total)
    }

    // -- Confirmation polling --------------------------------------------

    /// Poll for confirmation of a submitted transaction.
    ///
    /// Bounded retry loop: up to 30 attempts spaced 2 seconds apart.
    /// Transient status-read failures count as an attempt and the loop
    /// continues. The future holds no state across awaits, so dropping it
    /// (e.g. losing a `tokio::select!` race against shutdown) cancels the
    /// wait mid-poll with no side effects.
    async fn await_confirmation(&self, signature: &str) -> Result<(), SwapError> {
        for attempt in 1..=MAX_CONFIRMATION_ATTEMPTS {
            match self.signature_status(signature).await {
                Ok(ConfirmationStatus::Confirmed) | Ok(ConfirmationStatus::Finalized) => {
                    debug!(signature, attempt, "Transaction confirmed");
                    return Ok(());
                }
                Ok(ConfirmationStatus::Failed(reason)) => {
                    return Err(SwapError::OnChain {
                        signature: signature.to_string(),
                        reason,
                    });
                }
                Ok(ConfirmationStatus::Pending) => {
                    debug!(signature, attempt, "Awaiting confirmation");
                }
                Err(e) => {
                    warn!(signature, attempt, error = %e, "Status poll failed, retrying");
                }
            }

            if attempt < MAX_CONFIRMATION_ATTEMPTS {
                tokio::time::sleep(CONFIRMATION_POLL_INTERVAL).await;
            }
        }

        Err(SwapError::Unconfirmed {
            signature: signature.to_string(),
            attempts: MAX_CONFIRMATION_ATTEMPTS,
        })
    }
}

// ---------------------------------------------------------------------------
// LedgerGateway trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerGateway for SolanaLedger {
    async fn execute_swap(&self, tx: SwapTransaction) -> Result<String, SwapError> {
        let signed = sign_transaction(self.signer.as_ref(), &tx.transaction_base64)?;

        let signature = self
            .submit_transaction(&signed)
            .await
            .map_err(SwapError::Submission)?;

        info!(
            signature = %signature,
            last_valid_block_height = tx.last_valid_block_height,
            "Transaction submitted"
        );

        self.await_confirmation(&signature).await?;
        Ok(signature)
    }

    async fn get_balance(&self, mint: &str) -> Result<Decimal, GatewayError> {
        let owner = self.signer.public_key();

        if mint == NATIVE_MINT {
            let result = self.rpc("getBalance", json!([owner])).await?;
            let lamports = result
                .get("value")
                .and_then(Value::as_u64)
                .ok_or_else(|| GatewayError::Malformed {
                    service: SERVICE_NAME,
                    detail: "getBalance result has no integer value".to_string(),
                })?;
            return Ok(to_major_units(lamports, NATIVE_DECIMALS));
        }

        let result = self
            .rpc(
                "getTokenAccountsByOwner",
                json!([owner, {"mint": mint}, {"encoding": "jsonParsed"}]),
            )
            .await?;
        Self::parse_token_balance(&result)
    }

    async fn verify_minimum_balance(
        &self,
        mint: &str,
        minimum: Decimal,
    ) -> Result<bool, GatewayError> {
        let balance = self.get_balance(mint).await?;
        Ok(balance >= minimum)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
