//! Service API — Axum web server exposing the cascade engine.
//!
//! Cascade invocation, single-trade execution, pair management, and risk
//! inspection. CORS enabled for local development.

pub mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Start the API web server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_api(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "API server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind API port");

        axum::serve(listener, app).await.expect("API server error");
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/cascade", post(routes::post_cascade))
        .route("/api/trades", post(routes::post_trade))
        .route("/api/pairs", get(routes::get_pairs).post(routes::post_pair))
        .route("/api/pairs/:id/rank", put(routes::put_rank))
        .route("/api/pairs/:id/enabled", put(routes::put_enabled))
        .route("/api/risk", get(routes::get_risk))
        .route("/api/risk/check", post(routes::post_risk_check))
        .route("/api/scores/refresh", post(routes::post_refresh_scores))
        .route("/api/status", get(routes::get_status))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::engine::{CascadeConfig, CascadeOrchestrator};
    use crate::gateways::{LedgerGateway, MockLedgerGateway, MockQuoteGateway, QuoteGateway};
    use crate::pairs::PairRegistry;
    use crate::strategy::ranker::ProfitabilityRanker;
    use crate::strategy::risk::{RiskLimits, RiskManager};
    use super::routes::ServiceState;

    fn test_state() -> AppState {
        let quoter: Arc<dyn QuoteGateway> = Arc::new(MockQuoteGateway::new());
        let ledger: Arc<dyn LedgerGateway> = Arc::new(MockLedgerGateway::new());
        let registry = Arc::new(PairRegistry::new());
        let risk = Arc::new(RiskManager::new(RiskLimits {
            max_trade_notional: dec!(5),
            max_daily_notional: dec!(50),
            min_trade_size: dec!(0.01),
        }));
        let ranker = Arc::new(ProfitabilityRanker::new(
            Arc::clone(&registry),
            Arc::clone(&quoter),
            9,
        ));
        let orchestrator = Arc::new(CascadeOrchestrator::new(
            quoter,
            ledger,
            Arc::clone(&ranker),
            Arc::clone(&risk),
            Arc::clone(&registry),
            CascadeConfig {
                home_mint: "So11111111111111111111111111111111111111112".to_string(),
                home_decimals: 9,
                wrap_native: true,
                signer_public_key: "TestPubkey111".to_string(),
            },
        ));
        Arc::new(ServiceState {
            orchestrator,
            registry,
            risk,
            ranker,
            started_at: Utc::now(),
        })
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_pairs_empty() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/pairs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_pair_then_duplicate_conflicts() {
        let state = test_state();
        let body = serde_json::json!({
            "id": "sol-usdc",
            "stable_mint": "So11111111111111111111111111111111111111112",
            "target_mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "rank": 1
        });

        let app = build_router(Arc::clone(&state));
        let resp = app
            .oneshot(json_request("POST", "/api/pairs", body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let app = build_router(state);
        let resp = app
            .oneshot(json_request("POST", "/api/pairs", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_rank_unknown_pair_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/pairs/ghost/rank",
                serde_json::json!({"rank": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_enabled_unknown_pair_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/pairs/ghost/enabled",
                serde_json::json!({"enabled": false}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cascade_with_no_pairs_is_structured_rejection() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/cascade",
                serde_json::json!({"initial_amount": 1.0}),
            ))
            .await
            .unwrap();
        // Rejection is a structured 200, not an HTTP error.
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert!(json["error_message"]
            .as_str()
            .unwrap()
            .contains("no enabled trading pairs"));
    }

    #[tokio::test]
    async fn test_trade_unknown_pair_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/trades",
                serde_json::json!({"pair_id": "ghost", "amount": 1.0}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_risk_status_reports_limits() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/risk").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["max_daily_notional"].as_f64().unwrap(), 50.0);
        assert_eq!(json["current_daily_volume"].as_f64().unwrap(), 0.0);
        assert_eq!(json["trades_today"].as_u64().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_risk_check_reports_violations() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/risk/check",
                serde_json::json!({"notional": 100.0}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["passed"], false);
        assert!(!json["violations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["pairs_total"].as_u64().unwrap(), 0);
        assert!(json["uptime_secs"].as_i64().unwrap() >= 0);
    }
}
