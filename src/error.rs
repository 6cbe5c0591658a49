//! Domain error taxonomy.
//!
//! Expected business rejections (risk violations, price-impact gates,
//! unknown pair ids) travel as values in the types that report them;
//! the enums here cover configuration rejections and external-system
//! failures, which carry different recovery semantics: a pre-flight
//! rejection can simply be retried, an execution failure may require
//! balance reconciliation first.

use thiserror::Error;

/// Rejections from the trading-pair store. Reported synchronously;
/// no state is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairStoreError {
    #[error("trading pair not found: {0}")]
    NotFound(String),
    #[error("trading pair already exists: {0}")]
    Duplicate(String),
}

/// Failures talking to an external gateway (quote service or ledger RPC).
///
/// A malformed response is deliberately distinct from a transport failure:
/// the gateway answered, but with a shape we refuse to act on.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("malformed {service} response: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Failures while executing a swap transaction against the ledger.
///
/// Everything before `Submission` is pre-flight: nothing has touched the
/// chain. From submission onwards the hop may be partially effected
/// on-chain and must be reported distinctly.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("transaction signing failed: {0}")]
    Signing(String),
    #[error("transaction submission failed: {0}")]
    Submission(#[source] GatewayError),
    #[error("transaction {signature} failed on-chain: {reason}")]
    OnChain { signature: String, reason: String },
    #[error(
        "transaction {signature} unconfirmed after {attempts} attempts; \
         manual reconciliation required before retrying"
    )]
    Unconfirmed { signature: String, attempts: u32 },
}

impl SwapError {
    /// Whether the on-chain outcome of this failure is unknown, meaning
    /// the caller must reconcile balances instead of retrying.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, SwapError::Unconfirmed { .. })
    }

    /// The submitted signature, if the failure happened after submission.
    pub fn signature(&self) -> Option<&str> {
        match self {
            SwapError::OnChain { signature, .. } | SwapError::Unconfirmed { signature, .. } => {
                Some(signature)
            }
            _ => None,
        }
    }
}
