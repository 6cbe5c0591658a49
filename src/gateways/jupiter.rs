//! Jupiter swap-routing integration.
//!
//! Quotes routes and builds unsigned swap transactions via the public
//! quote API. Responses are validated at the boundary: a response missing
//! required fields is a malformed-response error, never a null fault.
//!
//! API docs: https://station.jup.ag/docs/apis/swap-api
//! Amounts are string-encoded integers in minor units; `priceImpactPct`
//! is a percentage (1.0 = 1%).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use super::QuoteGateway;
use crate::error::GatewayError;
use crate::types::{Quote, SwapTransaction};

const SERVICE_NAME: &str = "jupiter";

// ---------------------------------------------------------------------------
// API response types (Jupiter JSON → Rust)
// ---------------------------------------------------------------------------

/// The fields of a `/quote` response we act on. The full payload is kept
/// separately and echoed back verbatim to `/swap`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteFields {
    in_amount: String,
    out_amount: String,
    price_impact_pct: String,
}

/// Response from `/swap` POST (build a swap transaction).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    last_valid_block_height: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Jupiter quote/swap API client.
pub struct JupiterClient {
    http: Client,
    base_url: String,
}

impl JupiterClient {
    /// Create a new client against the given API base URL
    /// (e.g. `https://quote-api.jup.ag/v6`).
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("CASCADE/0.1.0 (swap-execution-engine)")
            .build()
            .context("Failed to build HTTP client for Jupiter")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Parse a raw quote payload into a `Quote`, validating the fields
    /// the engine acts on.
    fn parse_quote(
        raw: Value,
        input_mint: &str,
        output_mint: &str,
        slippage_bps: u32,
    ) -> Result<Quote, GatewayError> {
        let fields: QuoteFields =
            serde_json::from_value(raw.clone()).map_err(|e| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: e.to_string(),
            })?;

        let input_amount = parse_amount(&fields.in_amount, "inAmount")?;
        let output_amount = parse_amount(&fields.out_amount, "outAmount")?;
        let price_impact_pct =
            Decimal::from_str(&fields.price_impact_pct).map_err(|e| GatewayError::Malformed {
                service: SERVICE_NAME,
                detail: format!("priceImpactPct {:?}: {e}", fields.price_impact_pct),
            })?;

        Ok(Quote {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            input_amount,
            output_amount,
            price_impact_pct,
            slippage_bps,
            route: raw,
        })
    }
}

fn parse_amount(value: &str, field: &str) -> Result<u64, GatewayError> {
    value.parse::<u64>().map_err(|e| GatewayError::Malformed {
        service: SERVICE_NAME,
        detail: format!("{field} {value:?}: {e}"),
    })
}

async fn error_body(resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    GatewayError::Api {
        service: SERVICE_NAME,
        status,
        body,
    }
}

// ---------------------------------------------------------------------------
// QuoteGateway trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl QuoteGateway for JupiterClient {
    async fn fetch_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_minor: u64,
        slippage_bps: u32,
    ) -> Result<Quote, GatewayError> {
        let url = format!("{}/quote", self.base_url);

        debug!(
            input_mint,
            output_mint, amount_minor, slippage_bps, "Fetching quote"
        );

        let amount = amount_minor.to_string();
        let slippage = slippage_bps.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_body(resp).await);
        }

        let raw: Value = resp.json().await?;
        let quote = Self::parse_quote(raw, input_mint, output_mint, slippage_bps)?;

        debug!(
            in_amount = quote.input_amount,
            out_amount = quote.output_amount,
            price_impact_pct = %quote.price_impact_pct,
            "Quote received"
        );

        Ok(quote)
    }

    async fn build_swap(
        &self,
        quote: Quote,
        signer_public_key: &str,
        wrap_native: bool,
    ) -> Result<SwapTransaction, GatewayError> {
        let url = format!("{}/swap", self.base_url);

        let body = serde_json::json!({
            "quoteResponse": quote.route,
            "userPublicKey": signer_public_key,
            "wrapAndUnwrapSol": wrap_native,
        });

        let resp = self.http.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(error_body(resp).await);
        }

        let swap: SwapResponse = resp.json().await.map_err(|e| GatewayError::Malformed {
            service: SERVICE_NAME,
            detail: e.to_string(),
        })?;

        debug!(
            last_valid_block_height = swap.last_valid_block_height,
            "Swap transaction built"
        );

        Ok(SwapTransaction {
            transaction_base64: swap.swap_transaction,
            last_valid_block_height: swap.last_valid_block_height,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
