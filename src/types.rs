//! Shared types for the CASCADE engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that gateway, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Unit conversion
// ---------------------------------------------------------------------------

/// Failure to convert between major and minor units.
///
/// Amounts cross a fixed-scale unit boundary at the ledger layer; the
/// conversion must be exact integer arithmetic, so a fractional remainder
/// or an overflow is an error, never a rounding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("amount {0} is not representable in whole minor units")]
    FractionalMinorUnits(Decimal),
    #[error("amount {0} overflows the minor-unit range")]
    Overflow(Decimal),
    #[error("amount {0} is negative")]
    Negative(Decimal),
}

/// Convert a major-unit amount (e.g. 1.5 SOL) to integer minor units
/// (e.g. 1_500_000_000 lamports at scale 9).
pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<u64, UnitError> {
    if amount.is_sign_negative() {
        return Err(UnitError::Negative(amount));
    }
    let scale = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(UnitError::Overflow(amount))?;
    let scaled = amount
        .checked_mul(scale)
        .ok_or(UnitError::Overflow(amount))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(UnitError::FractionalMinorUnits(amount));
    }
    scaled.to_u64().ok_or(UnitError::Overflow(amount))
}

/// Convert integer minor units back to a major-unit decimal. Always exact.
pub fn to_major_units(minor: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(minor as i128, decimals).normalize()
}

// ---------------------------------------------------------------------------
// Trading pair
// ---------------------------------------------------------------------------

/// A configured trading pair: one hop candidate in a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPair {
    pub id: String,
    /// Mint of the asset sold on this hop (the cascade's funding side).
    pub stable_mint: String,
    /// Mint of the asset bought on this hop.
    pub target_mint: String,
    /// Cascade ordering: lower rank is tried first.
    pub profitability_rank: u32,
    pub enabled: bool,
    /// Advisory liquidity score (0–100), refreshed periodically.
    /// Last write wins; never affects cascade ordering.
    pub current_profitability_score: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
    pub risk: PairRiskConfig,
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} (rank {} | score {:.0} | {})",
            self.id,
            self.stable_mint,
            self.target_mint,
            self.profitability_rank,
            self.current_profitability_score,
            if self.enabled { "enabled" } else { "disabled" },
        )
    }
}

/// Per-pair overrides of the global risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRiskConfig {
    /// Overrides the global per-trade notional ceiling when set.
    pub max_trade_notional: Option<Decimal>,
    /// Slippage tolerance passed to the quote gateway, in basis points.
    pub slippage_bps_tolerance: u32,
    /// Minimum wallet balance of the funding asset required before a hop
    /// on this pair is attempted.
    pub min_wallet_balance: Decimal,
}

impl Default for PairRiskConfig {
    fn default() -> Self {
        Self {
            max_trade_notional: None,
            slippage_bps_tolerance: 50,
            min_wallet_balance: Decimal::ZERO,
        }
    }
}

impl TradingPair {
    /// Helper to build a test pair with sensible defaults.
    #[cfg(test)]
    pub fn sample(id: &str, rank: u32) -> Self {
        TradingPair {
            id: id.to_string(),
            stable_mint: "So11111111111111111111111111111111111111112".to_string(),
            target_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            profitability_rank: rank,
            enabled: true,
            current_profitability_score: Decimal::ZERO,
            last_updated: None,
            risk: PairRiskConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quotes and swap transactions
// ---------------------------------------------------------------------------

/// A route quote from the swap gateway.
///
/// Immutable once returned and consumed exactly once: `build_swap` takes
/// the quote by value, so a stale quote cannot be reused for a second
/// transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in minor units of the input mint.
    pub input_amount: u64,
    /// Quoted output amount in minor units of the output mint.
    pub output_amount: u64,
    /// Price impact in percent (1.0 = 1%).
    pub price_impact_pct: Decimal,
    pub slippage_bps: u32,
    /// The gateway's full quote payload, echoed back verbatim when
    /// requesting the swap transaction built from this quote.
    pub route: serde_json::Value,
}

/// An unsigned swap transaction built from an accepted quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTransaction {
    /// Opaque serialized transaction, base64-encoded.
    pub transaction_base64: String,
    /// Block reference after which the transaction expires.
    pub last_valid_block_height: u64,
}

/// Confirmation state of a submitted transaction, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// Not yet visible, or not yet at a terminal commitment level.
    Pending,
    Confirmed,
    Finalized,
    /// Landed on-chain but the execution itself failed.
    Failed(String),
}

impl ConfirmationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// Cascade results
// ---------------------------------------------------------------------------

/// Outcome of one hop within a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStep {
    pub step_number: usize,
    pub pair_id: String,
    pub success: bool,
    /// Present when a transaction was submitted (even if unconfirmed).
    pub transaction_signature: Option<String>,
    pub error_message: Option<String>,
    /// Set when the transaction was submitted but never reached a terminal
    /// confirmation state: the on-chain outcome is unknown and the hop
    /// requires manual balance reconciliation before retrying.
    pub needs_reconciliation: bool,
    pub details: Option<StepDetails>,
}

/// Execution details of a hop that at least reached the quoting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDetails {
    /// Hop input in major units of the funding asset.
    pub input_amount: Decimal,
    /// Quoted output in minor units of the target mint.
    pub output_amount_minor: u64,
    pub price_impact_pct: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Result of one cascade invocation. Built fresh per invocation and
/// returned to the caller; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeResult {
    pub cascade_id: Uuid,
    pub success: bool,
    pub initial_amount: Decimal,
    pub final_amount: Decimal,
    pub total_profit: Decimal,
    pub steps: Vec<CascadeStep>,
    /// Set only when the cascade stopped early.
    pub error_message: Option<String>,
}

impl CascadeResult {
    /// An immediate failure with no executed steps.
    pub fn rejected(cascade_id: Uuid, initial_amount: Decimal, reason: impl Into<String>) -> Self {
        CascadeResult {
            cascade_id,
            success: false,
            initial_amount,
            final_amount: initial_amount,
            total_profit: Decimal::ZERO,
            steps: Vec::new(),
            error_message: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Outcome of a risk check. Produced synchronously and never mutated
/// after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub passed: bool,
    /// Every violated rule, in a fixed order; never short-circuited so the
    /// caller sees the complete set of reasons a trade is rejected.
    pub violations: Vec<String>,
    pub current_daily_volume: Decimal,
    pub remaining_daily_capacity: Decimal,
}

impl RiskCheckResult {
    /// All violations joined into one caller-facing message.
    pub fn joined_violations(&self) -> String {
        self.violations.join("; ")
    }
}

/// A trade recorded against the daily risk counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub pair_id: String,
    pub notional: Decimal,
    pub signature: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Serialized daily counter, persisted so a same-day restart does not
/// forget notional already traded against the ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskJournal {
    pub day: NaiveDate,
    pub accumulated_notional: Decimal,
    pub trades: Vec<TradeRecord>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
