//! Service API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServiceState>`.
//! Domain rejections map to structured JSON bodies with proper status
//! codes (404 unknown pair, 409 duplicate); internal error details never
//! leak past the boundary.

use axum::{extract::Path, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{CascadeOrchestrator, CascadeRequest};
use crate::error::PairStoreError;
use crate::pairs::PairRegistry;
use crate::strategy::ranker::ProfitabilityRanker;
use crate::strategy::risk::RiskManager;
use crate::types::{
    CascadeResult, CascadeStep, PairRiskConfig, RiskCheckResult, TradingPair,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ServiceState {
    pub orchestrator: Arc<CascadeOrchestrator>,
    pub registry: Arc<PairRegistry>,
    pub risk: Arc<RiskManager>,
    pub ranker: Arc<ProfitabilityRanker>,
    pub started_at: DateTime<Utc>,
}

pub type AppState = Arc<ServiceState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub pair_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AddPairRequest {
    pub id: String,
    pub stable_mint: String,
    pub target_mint: String,
    pub rank: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub risk: Option<PairRiskConfig>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateRankRequest {
    pub rank: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RiskCheckRequest {
    pub notional: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskStatusResponse {
    pub current_daily_volume: Decimal,
    pub remaining_daily_capacity: Decimal,
    pub max_trade_notional: Decimal,
    pub max_daily_notional: Decimal,
    pub min_trade_size: Decimal,
    pub trades_today: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshScoresResponse {
    pub scored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub pairs_total: usize,
    pub pairs_enabled: usize,
    pub current_daily_volume: Decimal,
    pub remaining_daily_capacity: Decimal,
    pub uptime_secs: i64,
}

fn pair_error(err: PairStoreError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &err {
        PairStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        PairStoreError::Duplicate(_) => StatusCode::CONFLICT,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/cascade
pub async fn post_cascade(
    State(state): State<AppState>,
    Json(request): Json<CascadeRequest>,
) -> Json<CascadeResult> {
    // Every outcome, including rejection, is a structured result.
    Json(state.orchestrator.execute_cascade(request).await)
}

/// POST /api/trades
pub async fn post_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<CascadeStep>, (StatusCode, Json<ErrorBody>)> {
    state
        .orchestrator
        .execute_trade(&request.pair_id, request.amount)
        .await
        .map(Json)
        .map_err(pair_error)
}

/// GET /api/pairs
pub async fn get_pairs(State(state): State<AppState>) -> Json<Vec<TradingPair>> {
    Json(state.registry.all_pairs().await)
}

/// POST /api/pairs
pub async fn post_pair(
    State(state): State<AppState>,
    Json(request): Json<AddPairRequest>,
) -> Result<(StatusCode, Json<TradingPair>), (StatusCode, Json<ErrorBody>)> {
    let pair = TradingPair {
        id: request.id,
        stable_mint: request.stable_mint,
        target_mint: request.target_mint,
        profitability_rank: request.rank,
        enabled: request.enabled,
        current_profitability_score: Decimal::ZERO,
        last_updated: None,
        risk: request.risk.unwrap_or_default(),
    };

    state
        .registry
        .add_pair(pair.clone())
        .await
        .map(|()| (StatusCode::CREATED, Json(pair)))
        .map_err(pair_error)
}

/// PUT /api/pairs/:id/rank
pub async fn put_rank(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRankRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state
        .registry
        .update_rank(&id, request.rank)
        .await
        .map(|()| StatusCode::OK)
        .map_err(pair_error)
}

/// PUT /api/pairs/:id/enabled
pub async fn put_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetEnabledRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state
        .registry
        .set_enabled(&id, request.enabled)
        .await
        .map(|()| StatusCode::OK)
        .map_err(pair_error)
}

/// GET /api/risk
pub async fn get_risk(State(state): State<AppState>) -> Json<RiskStatusResponse> {
    let limits = state.risk.limits().clone();
    let journal = state.risk.snapshot();
    Json(RiskStatusResponse {
        current_daily_volume: journal.accumulated_notional,
        remaining_daily_capacity: state.risk.remaining_capacity(),
        max_trade_notional: limits.max_trade_notional,
        max_daily_notional: limits.max_daily_notional,
        min_trade_size: limits.min_trade_size,
        trades_today: journal.trades.len(),
    })
}

/// POST /api/risk/check
pub async fn post_risk_check(
    State(state): State<AppState>,
    Json(request): Json<RiskCheckRequest>,
) -> Json<RiskCheckResult> {
    Json(state.risk.check_trade_risk(request.notional, None))
}

/// POST /api/scores/refresh
pub async fn post_refresh_scores(State(state): State<AppState>) -> Json<RefreshScoresResponse> {
    let scored = state.ranker.refresh_all_scores().await;
    Json(RefreshScoresResponse { scored })
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let pairs = state.registry.all_pairs().await;
    let enabled = pairs.iter().filter(|p| p.enabled).count();
    Json(StatusResponse {
        pairs_total: pairs.len(),
        pairs_enabled: enabled,
        current_daily_volume: state.risk.daily_volume(),
        remaining_daily_capacity: state.risk.remaining_capacity(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
