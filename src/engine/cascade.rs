//! Cascade orchestrator.
//!
//! The top-level state machine: walks the ranked pair list hop by hop,
//! gating each hop on wallet balance, risk capacity, and price impact
//! before quoting, building, submitting, and confirming the swap.
//!
//! Hops run strictly sequentially — later hops spend the funds produced
//! by earlier ones. A hop failure is captured as a failed `CascadeStep`
//! and never propagates as an error past this boundary; the caller sees
//! structured reasons only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PairStoreError;
use crate::gateways::{LedgerGateway, QuoteGateway};
use crate::pairs::PairRegistry;
use crate::strategy::ranker::ProfitabilityRanker;
use crate::strategy::risk::RiskManager;
use crate::types::{
    to_major_units, to_minor_units, CascadeResult, CascadeStep, StepDetails, TradingPair,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Hard ceiling on quoted price impact per hop, in percent. An
/// independent safety gate on top of the risk checks; not configurable
/// per call.
const MAX_PRICE_IMPACT_PCT: Decimal = dec!(1.0);

/// Engine-level settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// The cascade's home asset. Hop output propagates into the carried
    /// amount only when the hop returns to this mint.
    pub home_mint: String,
    pub home_decimals: u32,
    pub wrap_native: bool,
    /// Public key the swap gateway builds transactions for.
    pub signer_public_key: String,
}

/// One cascade invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct CascadeRequest {
    /// Starting amount in home-asset major units.
    pub initial_amount: Decimal,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_stop_on_failure")]
    pub stop_on_failure: bool,
    /// When present, restricts the cascade to this subset of pairs,
    /// preserving rank order.
    #[serde(default)]
    pub specific_pair_ids: Option<Vec<String>>,
}

fn default_max_depth() -> usize {
    3
}

fn default_stop_on_failure() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Hop state machine
// ---------------------------------------------------------------------------

/// Per-hop execution states, in gate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HopState {
    Pending,
    BalanceVerified,
    RiskApproved,
    Quoted,
    TransactionBuilt,
    Submitted,
    Confirmed,
}

impl fmt::Display for HopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HopState::Pending => "PENDING",
            HopState::BalanceVerified => "BALANCE_VERIFIED",
            HopState::RiskApproved => "RISK_APPROVED",
            HopState::Quoted => "QUOTED",
            HopState::TransactionBuilt => "TRANSACTION_BUILT",
            HopState::Submitted => "SUBMITTED",
            HopState::Confirmed => "CONFIRMED",
        };
        f.write_str(s)
    }
}

/// What the cascade loop does after a hop resolves.
enum HopDisposition {
    /// Hop succeeded; carry this amount into the next hop.
    Advance(Decimal),
    /// Hop failed; `stop_on_failure` decides whether the cascade goes on
    /// (with the amount unchanged — a failed hop consumes no funds).
    Faulted,
    /// The on-chain outcome is unknown; the cascade must stop regardless
    /// of `stop_on_failure` to avoid double submission.
    Halt(String),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct CascadeOrchestrator {
    quoter: Arc<dyn QuoteGateway>,
    ledger: Arc<dyn LedgerGateway>,
    ranker: Arc<ProfitabilityRanker>,
    risk: Arc<RiskManager>,
    registry: Arc<PairRegistry>,
    config: CascadeConfig,
}

impl CascadeOrchestrator {
    pub fn new(
        quoter: Arc<dyn QuoteGateway>,
        ledger: Arc<dyn LedgerGateway>,
        ranker: Arc<ProfitabilityRanker>,
        risk: Arc<RiskManager>,
        registry: Arc<PairRegistry>,
        config: CascadeConfig,
    ) -> Self {
        Self {
            quoter,
            ledger,
            ranker,
            risk,
            registry,
            config,
        }
    }

    /// Run a full cascade. Never returns an error: every outcome,
    /// including immediate rejection, is a structured `CascadeResult`.
    pub async fn execute_cascade(&self, request: CascadeRequest) -> CascadeResult {
        let cascade_id = Uuid::new_v4();

        if request.initial_amount <= Decimal::ZERO {
            return CascadeResult::rejected(
                cascade_id,
                request.initial_amount,
                "initial amount must be positive",
            );
        }
        if request.max_depth == 0 {
            return CascadeResult::rejected(
                cascade_id,
                request.initial_amount,
                "max cascade depth must be at least 1",
            );
        }

        let mut pairs = self.ranker.get_ranked_pairs().await;
        if let Some(ids) = &request.specific_pair_ids {
            pairs.retain(|p| ids.iter().any(|id| id == &p.id));
        }
        pairs.truncate(request.max_depth);

        if pairs.is_empty() {
            info!(cascade_id = %cascade_id, "Cascade rejected: no enabled trading pairs available");
            return CascadeResult::rejected(
                cascade_id,
                request.initial_amount,
                "no enabled trading pairs available",
            );
        }

        info!(
            cascade_id = %cascade_id,
            initial_amount = %request.initial_amount,
            hops = pairs.len(),
            stop_on_failure = request.stop_on_failure,
            "Cascade starting"
        );

        let mut steps: Vec<CascadeStep> = Vec::with_capacity(pairs.len());
        let mut current_amount = request.initial_amount;
        let mut stopped: Option<String> = None;

        for (index, pair) in pairs.iter().enumerate() {
            let step_number = index + 1;
            let (step, disposition) = self.execute_hop(step_number, pair, current_amount).await;
            steps.push(step);

            match disposition {
                HopDisposition::Advance(next) => {
                    current_amount = next;
                }
                HopDisposition::Faulted => {
                    if request.stop_on_failure {
                        stopped = Some(format!(
                            "cascade stopped at step {step_number} ({})",
                            pair.id
                        ));
                        break;
                    }
                    // Continue with the same amount — the failed hop
                    // consumed no funds.
                }
                HopDisposition::Halt(reason) => {
                    stopped = Some(reason);
                    break;
                }
            }
        }

        let result = CascadeResult {
            cascade_id,
            success: stopped.is_none(),
            initial_amount: request.initial_amount,
            final_amount: current_amount,
            total_profit: current_amount - request.initial_amount,
            steps,
            error_message: stopped,
        };

        info!(
            cascade_id = %cascade_id,
            success = result.success,
            steps = result.steps.len(),
            final_amount = %result.final_amount,
            total_profit = %result.total_profit,
            "Cascade complete"
        );

        result
    }

    /// Execute a single trade on one pair, outside a cascade. The same
    /// gate sequence applies; an unknown pair id is the only error.
    pub async fn execute_trade(
        &self,
        pair_id: &str,
        amount: Decimal,
    ) -> Result<CascadeStep, PairStoreError> {
        let pair = self
            .registry
            .get(pair_id)
            .await
            .ok_or_else(|| PairStoreError::NotFound(pair_id.to_string()))?;

        if !pair.enabled {
            return Ok(failed_step(
                1,
                &pair.id,
                format!("trading pair {pair_id} is disabled"),
                None,
            ));
        }

        let (step, _) = self.execute_hop(1, &pair, amount).await;
        Ok(step)
    }

    // -- Hop execution ---------------------------------------------------

    async fn execute_hop(
        &self,
        step_number: usize,
        pair: &TradingPair,
        amount: Decimal,
    ) -> (CascadeStep, HopDisposition) {
        let mut state = HopState::Pending;
        debug!(pair_id = %pair.id, step_number, amount = %amount, state = %state, "Hop starting");

        // Gate 1: wallet balance.
        match self
            .ledger
            .verify_minimum_balance(&pair.stable_mint, pair.risk.min_wallet_balance)
            .await
        {
            Ok(true) => advance(&mut state, HopState::BalanceVerified, &pair.id),
            Ok(false) => {
                return fault(
                    step_number,
                    pair,
                    format!(
                        "balance check failed: wallet below minimum {} of {}",
                        pair.risk.min_wallet_balance, pair.stable_mint
                    ),
                    None,
                );
            }
            Err(e) => {
                return fault(step_number, pair, format!("balance check failed: {e}"), None);
            }
        }

        // Gate 2: risk capacity, reserved atomically.
        let reservation = match self.risk.reserve(amount, pair.risk.max_trade_notional) {
            Ok(r) => {
                advance(&mut state, HopState::RiskApproved, &pair.id);
                r
            }
            Err(check) => {
                return fault(
                    step_number,
                    pair,
                    format!("risk check failed: {}", check.joined_violations()),
                    None,
                );
            }
        };

        // Gate 3: quote and price impact.
        let amount_minor = match to_minor_units(amount, self.config.home_decimals) {
            Ok(v) => v,
            Err(e) => {
                self.risk.release(reservation);
                return fault(step_number, pair, format!("quote failed: {e}"), None);
            }
        };

        let quote = match self
            .quoter
            .fetch_quote(
                &pair.stable_mint,
                &pair.target_mint,
                amount_minor,
                pair.risk.slippage_bps_tolerance,
            )
            .await
        {
            Ok(q) => {
                advance(&mut state, HopState::Quoted, &pair.id);
                q
            }
            Err(e) => {
                self.risk.release(reservation);
                return fault(step_number, pair, format!("quote failed: {e}"), None);
            }
        };

        let details = StepDetails {
            input_amount: amount,
            output_amount_minor: quote.output_amount,
            price_impact_pct: quote.price_impact_pct,
            executed_at: chrono::Utc::now(),
        };

        if quote.price_impact_pct > MAX_PRICE_IMPACT_PCT {
            self.risk.release(reservation);
            return fault(
                step_number,
                pair,
                format!(
                    "price impact {}% exceeds the {}% ceiling",
                    quote.price_impact_pct, MAX_PRICE_IMPACT_PCT
                ),
                Some(details),
            );
        }

        // Build the transaction from this exact quote (consumed here; a
        // fresh hop always requotes).
        let output_amount_minor = quote.output_amount;
        let swap_tx = match self
            .quoter
            .build_swap(quote, &self.config.signer_public_key, self.config.wrap_native)
            .await
        {
            Ok(tx) => {
                advance(&mut state, HopState::TransactionBuilt, &pair.id);
                tx
            }
            Err(e) => {
                self.risk.release(reservation);
                return fault(
                    step_number,
                    pair,
                    format!("swap build failed: {e}"),
                    Some(details),
                );
            }
        };

        // Submit and await confirmation.
        advance(&mut state, HopState::Submitted, &pair.id);
        match self.ledger.execute_swap(swap_tx).await {
            Ok(signature) => {
                advance(&mut state, HopState::Confirmed, &pair.id);
                self.risk.commit(reservation, &pair.id, Some(signature.clone()));

                let next_amount = if pair.target_mint == self.config.home_mint {
                    to_major_units(output_amount_minor, self.config.home_decimals)
                } else {
                    // No general multi-asset ledger: only amounts returning
                    // to the home asset propagate between hops.
                    amount
                };

                info!(
                    pair_id = %pair.id,
                    step_number,
                    signature = %signature,
                    output_minor = output_amount_minor,
                    "Hop confirmed"
                );

                (
                    CascadeStep {
                        step_number,
                        pair_id: pair.id.clone(),
                        success: true,
                        transaction_signature: Some(signature),
                        error_message: None,
                        needs_reconciliation: false,
                        details: Some(details),
                    },
                    HopDisposition::Advance(next_amount),
                )
            }
            Err(e) if e.needs_reconciliation() => {
                // Unknown on-chain outcome: the capacity counts as spent
                // and the whole cascade stops.
                let signature = e.signature().map(str::to_string);
                self.risk.commit(reservation, &pair.id, signature.clone());
                warn!(
                    pair_id = %pair.id,
                    step_number,
                    signature = signature.as_deref().unwrap_or("unknown"),
                    "Hop unresolved: submitted but unconfirmed"
                );
                (
                    CascadeStep {
                        step_number,
                        pair_id: pair.id.clone(),
                        success: false,
                        transaction_signature: signature,
                        error_message: Some(format!("execution unresolved: {e}")),
                        needs_reconciliation: true,
                        details: Some(details),
                    },
                    HopDisposition::Halt(format!(
                        "cascade halted at step {step_number} ({}): {e}",
                        pair.id
                    )),
                )
            }
            Err(e) => {
                self.risk.release(reservation);
                let signature = e.signature().map(str::to_string);
                let (step, disposition) = fault(
                    step_number,
                    pair,
                    format!("execution failed: {e}"),
                    Some(details),
                );
                (
                    CascadeStep {
                        transaction_signature: signature,
                        ..step
                    },
                    disposition,
                )
            }
        }
    }
}

fn advance(state: &mut HopState, to: HopState, pair_id: &str) {
    debug!(pair_id, from = %state, to = %to, "Hop state");
    *state = to;
}

fn failed_step(
    step_number: usize,
    pair_id: &str,
    reason: String,
    details: Option<StepDetails>,
) -> CascadeStep {
    CascadeStep {
        step_number,
        pair_id: pair_id.to_string(),
        success: false,
        transaction_signature: None,
        error_message: Some(reason),
        needs_reconciliation: false,
        details,
    }
}

fn fault(
    step_number: usize,
    pair: &TradingPair,
    reason: String,
    details: Option<StepDetails>,
) -> (CascadeStep, HopDisposition) {
    warn!(pair_id = %pair.id, step_number, reason = %reason, "Hop failed");
    (
        failed_step(step_number, &pair.id, reason, details),
        HopDisposition::Faulted,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
