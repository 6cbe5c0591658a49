//! External gateway integrations.
//!
//! Defines the trait seams for the two external collaborators and provides
//! implementations for:
//! - Jupiter — swap-routing quote/swap HTTP API
//! - Solana — ledger JSON-RPC (signing, submission, balances, confirmation)

pub mod jupiter;
pub mod solana;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{GatewayError, SwapError};
use crate::types::{Quote, SwapTransaction};

/// Abstraction over the swap-routing service.
///
/// `build_swap` takes the quote by value: a quote is consumed exactly once
/// and can never be reused for a second transaction after it has gone
/// stale.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteGateway: Send + Sync {
    /// Request a route quote for swapping `amount_minor` of `input_mint`
    /// into `output_mint`.
    async fn fetch_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_minor: u64,
        slippage_bps: u32,
    ) -> Result<Quote, GatewayError>;

    /// Build an unsigned swap transaction from an accepted quote.
    async fn build_swap(
        &self,
        quote: Quote,
        signer_public_key: &str,
        wrap_native: bool,
    ) -> Result<SwapTransaction, GatewayError>;
}

/// Abstraction over the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Sign, submit, and await confirmation of a swap transaction.
    /// Returns the transaction signature on confirmed success.
    async fn execute_swap(&self, tx: SwapTransaction) -> Result<String, SwapError>;

    /// Wallet balance of the given mint, in major units. Exact fixed-point
    /// arithmetic; never lossy floating point.
    async fn get_balance(&self, mint: &str) -> Result<Decimal, GatewayError>;

    /// Pre-flight gate: whether the wallet holds at least `minimum` of
    /// the given mint.
    async fn verify_minimum_balance(
        &self,
        mint: &str,
        minimum: Decimal,
    ) -> Result<bool, GatewayError>;
}

/// A signer capable of producing a signature for a transaction byte
/// buffer. Key management beyond this boundary is out of scope.
pub trait TransactionSigner: Send + Sync {
    /// Base58 public key of the signing identity (the fee payer).
    fn public_key(&self) -> String;

    /// Sign the given message bytes, returning the 64-byte signature.
    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SwapError>;
}
