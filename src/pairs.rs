//! Trading-pair registry.
//!
//! The single shared store of trading-pair configuration. All mutation
//! goes through an `RwLock` so a concurrently running ranking pass can
//! never observe a half-written pair. Pairs are created via configuration
//! or `add_pair` and are never deleted.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::PairStoreError;
use crate::types::TradingPair;

/// Shared, mutation-safe trading-pair store.
pub struct PairRegistry {
    pairs: RwLock<HashMap<String, TradingPair>>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new pair. Rejects a duplicate id without mutating state.
    pub async fn add_pair(&self, pair: TradingPair) -> Result<(), PairStoreError> {
        let mut pairs = self.pairs.write().await;
        if pairs.contains_key(&pair.id) {
            return Err(PairStoreError::Duplicate(pair.id));
        }
        info!(pair_id = %pair.id, rank = pair.profitability_rank, "Trading pair registered");
        pairs.insert(pair.id.clone(), pair);
        Ok(())
    }

    /// Change a pair's cascade rank (lower = tried first).
    pub async fn update_rank(&self, id: &str, rank: u32) -> Result<(), PairStoreError> {
        let mut pairs = self.pairs.write().await;
        let pair = pairs
            .get_mut(id)
            .ok_or_else(|| PairStoreError::NotFound(id.to_string()))?;
        debug!(pair_id = %id, from = pair.profitability_rank, to = rank, "Rank updated");
        pair.profitability_rank = rank;
        Ok(())
    }

    /// Enable or disable a pair for cascade selection.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), PairStoreError> {
        let mut pairs = self.pairs.write().await;
        let pair = pairs
            .get_mut(id)
            .ok_or_else(|| PairStoreError::NotFound(id.to_string()))?;
        info!(pair_id = %id, enabled, "Pair enablement changed");
        pair.enabled = enabled;
        Ok(())
    }

    /// Store a freshly computed profitability score. Last write wins.
    pub async fn update_score(&self, id: &str, score: Decimal) -> Result<(), PairStoreError> {
        let mut pairs = self.pairs.write().await;
        let pair = pairs
            .get_mut(id)
            .ok_or_else(|| PairStoreError::NotFound(id.to_string()))?;
        pair.current_profitability_score = score;
        pair.last_updated = Some(Utc::now());
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<TradingPair> {
        self.pairs.read().await.get(id).cloned()
    }

    /// All pairs, rank-ordered for stable output.
    pub async fn all_pairs(&self) -> Vec<TradingPair> {
        let mut pairs: Vec<TradingPair> = self.pairs.read().await.values().cloned().collect();
        pairs.sort_by(|a, b| {
            a.profitability_rank
                .cmp(&b.profitability_rank)
                .then_with(|| a.id.cmp(&b.id))
        });
        pairs
    }

    /// Enabled pairs in ascending rank order: the cascade try-order.
    /// Profitability score is advisory only and never affects this list.
    pub async fn ranked_pairs(&self) -> Vec<TradingPair> {
        let mut pairs: Vec<TradingPair> = self
            .pairs
            .read()
            .await
            .values()
            .filter(|p| p.enabled)
            .cloned()
            .collect();
        pairs.sort_by(|a, b| {
            a.profitability_rank
                .cmp(&b.profitability_rank)
                .then_with(|| a.id.cmp(&b.id))
        });
        pairs
    }

    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }
}

impl Default for PairRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_add_and_get() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("a", 1)).await.unwrap();
        let pair = registry.get("a").await.unwrap();
        assert_eq!(pair.profitability_rank, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("a", 1)).await.unwrap();
        let err = registry.add_pair(TradingPair::sample("a", 2)).await.unwrap_err();
        assert_eq!(err, PairStoreError::Duplicate("a".to_string()));
        // Original untouched
        assert_eq!(registry.get("a").await.unwrap().profitability_rank, 1);
    }

    #[tokio::test]
    async fn test_update_rank_unknown_id() {
        let registry = PairRegistry::new();
        let err = registry.update_rank("missing", 5).await.unwrap_err();
        assert_eq!(err, PairStoreError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_set_enabled_unknown_id() {
        let registry = PairRegistry::new();
        let err = registry.set_enabled("missing", false).await.unwrap_err();
        assert_eq!(err, PairStoreError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_ranked_pairs_filters_and_sorts() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("c", 3)).await.unwrap();
        registry.add_pair(TradingPair::sample("a", 1)).await.unwrap();
        let mut disabled = TradingPair::sample("b", 2);
        disabled.enabled = false;
        registry.add_pair(disabled).await.unwrap();

        let ranked = registry.ranked_pairs().await;
        let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_ranking_ignores_score() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("low-rank", 1)).await.unwrap();
        registry.add_pair(TradingPair::sample("high-rank", 2)).await.unwrap();
        // Give the worse-ranked pair a much better score
        registry.update_score("high-rank", dec!(99)).await.unwrap();
        registry.update_score("low-rank", dec!(0)).await.unwrap();

        let ranked = registry.ranked_pairs().await;
        assert_eq!(ranked[0].id, "low-rank");
    }

    #[tokio::test]
    async fn test_update_score_sets_timestamp() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("a", 1)).await.unwrap();
        assert!(registry.get("a").await.unwrap().last_updated.is_none());

        registry.update_score("a", dec!(72.5)).await.unwrap();
        let pair = registry.get("a").await.unwrap();
        assert_eq!(pair.current_profitability_score, dec!(72.5));
        assert!(pair.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_rank_ties_break_by_id() {
        let registry = PairRegistry::new();
        registry.add_pair(TradingPair::sample("zeta", 1)).await.unwrap();
        registry.add_pair(TradingPair::sample("alpha", 1)).await.unwrap();
        let ranked = registry.ranked_pairs().await;
        assert_eq!(ranked[0].id, "alpha");
    }
}
