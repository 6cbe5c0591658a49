//! Profitability ranker.
//!
//! Scores each trading pair by simulating a reference-size quote and
//! deriving a 0–100 liquidity score from the quoted price impact. The
//! score is advisory metadata: cascade order is determined by the
//! configured rank alone, and a pair that scores 0 is still tried.

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gateways::QuoteGateway;
use crate::pairs::PairRegistry;
use crate::types::{to_minor_units, TradingPair};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Reference notional quoted when scoring: 1.0 unit of the funding asset.
const REFERENCE_NOTIONAL: Decimal = dec!(1);

/// Each percentage point of price impact on the reference quote costs
/// ten score points.
const IMPACT_SCORE_WEIGHT: Decimal = dec!(10);

const MAX_SCORE: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// Scores pairs against the quote gateway and serves the cascade
/// try-order from the registry.
pub struct ProfitabilityRanker {
    registry: Arc<PairRegistry>,
    quoter: Arc<dyn QuoteGateway>,
    home_decimals: u32,
}

impl ProfitabilityRanker {
    pub fn new(registry: Arc<PairRegistry>, quoter: Arc<dyn QuoteGateway>, home_decimals: u32) -> Self {
        Self {
            registry,
            quoter,
            home_decimals,
        }
    }

    /// Derive a 0–100 score from a quoted price impact. Clamped at both
    /// ends, so hostile inputs (negative impact, or thousands of percent)
    /// stay in range.
    fn score_from_impact(price_impact_pct: Decimal) -> Decimal {
        (MAX_SCORE - price_impact_pct * IMPACT_SCORE_WEIGHT).clamp(Decimal::ZERO, MAX_SCORE)
    }

    /// Score one pair by quoting the reference notional. A quoting failure
    /// scores 0 — profitability degradation must never halt the ranking
    /// pipeline.
    pub async fn calculate_score(&self, pair: &TradingPair) -> Decimal {
        let reference_minor = match to_minor_units(REFERENCE_NOTIONAL, self.home_decimals) {
            Ok(v) => v,
            Err(e) => {
                warn!(pair_id = %pair.id, error = %e, "Reference notional unconvertible, scoring 0");
                return Decimal::ZERO;
            }
        };

        match self
            .quoter
            .fetch_quote(
                &pair.stable_mint,
                &pair.target_mint,
                reference_minor,
                pair.risk.slippage_bps_tolerance,
            )
            .await
        {
            Ok(quote) => {
                let score = Self::score_from_impact(quote.price_impact_pct);
                debug!(
                    pair_id = %pair.id,
                    price_impact_pct = %quote.price_impact_pct,
                    score = %score,
                    "Pair scored"
                );
                score
            }
            Err(e) => {
                warn!(pair_id = %pair.id, error = %e, "Score quote failed, scoring 0");
                Decimal::ZERO
            }
        }
    }

    /// Recompute and store scores for every enabled pair. Pairs are scored
    /// concurrently and failures are isolated per pair: one bad pair never
    /// blocks the rest of the batch.
    pub async fn refresh_all_scores(&self) -> usize {
        let pairs = self.registry.ranked_pairs().await;
        if pairs.is_empty() {
            debug!("No enabled pairs to score");
            return 0;
        }

        let scores = join_all(pairs.iter().map(|pair| async {
            (pair.id.clone(), self.calculate_score(pair).await)
        }))
        .await;

        let mut updated = 0;
        for (pair_id, score) in scores {
            match self.registry.update_score(&pair_id, score).await {
                Ok(()) => updated += 1,
                Err(e) => warn!(pair_id = %pair_id, error = %e, "Score update skipped"),
            }
        }

        info!(scored = updated, "Profitability scores refreshed");
        updated
    }

    /// The cascade try-order: enabled pairs, ascending configured rank.
    /// Score never affects ordering or inclusion.
    pub async fn get_ranked_pairs(&self) -> Vec<TradingPair> {
        self.registry.ranked_pairs().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
