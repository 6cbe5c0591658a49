//! CASCADE — Risk-Gated Multi-Hop Swap Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the daily risk journal from disk (or starts fresh), wires the
//! gateways and the orchestrator, serves the API, and runs the periodic
//! profitability-score refresh loop with graceful shutdown.

use anyhow::{Context, Result};
use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use cascade::api;
use cascade::api::routes::ServiceState;
use cascade::config;
use cascade::engine::{CascadeConfig, CascadeOrchestrator};
use cascade::gateways::jupiter::JupiterClient;
use cascade::gateways::solana::{LocalSigner, SolanaLedger};
use cascade::gateways::{LedgerGateway, QuoteGateway, TransactionSigner};
use cascade::pairs::PairRegistry;
use cascade::storage;
use cascade::strategy::ranker::ProfitabilityRanker;
use cascade::strategy::risk::{RiskLimits, RiskManager};

const BANNER: &str = r#"
   ____    _    ____   ____    _    ____  _____
  / ___|  / \  / ___| / ___|  / \  |  _ \| ____|
 | |     / _ \ \___ \| |     / _ \ | | | |  _|
 | |___ / ___ \ ___) | |___ / ___ \| |_| | |___
  \____/_/   \_\____/ \____/_/   \_\____/|_____|

  Risk-Gated Multi-Hop Swap Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        home_mint = %cfg.engine.home_mint,
        refresh_interval_secs = cfg.engine.score_refresh_interval_secs,
        pairs = cfg.pairs.len(),
        "CASCADE starting up"
    );

    // -- Wallet and gateways ---------------------------------------------

    let keypair = SecretString::new(
        config::AppConfig::resolve_env(&cfg.wallet.keypair_env)
            .context("Wallet keypair is required to sign transactions")?,
    );
    let signer: Arc<dyn TransactionSigner> =
        Arc::new(LocalSigner::from_base58(&keypair).context("Failed to load wallet keypair")?);
    let signer_public_key = signer.public_key();
    info!(wallet = %signer_public_key, "Wallet loaded");

    let quoter: Arc<dyn QuoteGateway> = Arc::new(JupiterClient::new(
        &cfg.quoter.base_url,
        cfg.quoter.timeout_secs,
    )?);
    let ledger: Arc<dyn LedgerGateway> = Arc::new(SolanaLedger::new(
        &cfg.ledger.rpc_url,
        cfg.ledger.timeout_secs,
        Arc::clone(&signer),
    )?);

    // -- Pair registry ---------------------------------------------------

    let registry = Arc::new(PairRegistry::new());
    for seed in cfg.pairs.iter().cloned() {
        registry
            .add_pair(seed.into())
            .await
            .context("Duplicate pair id in configuration")?;
    }
    info!(pairs = registry.len().await, "Trading pairs registered");

    // -- Risk manager (restored from journal when same-day) ---------------

    let limits = RiskLimits {
        max_trade_notional: cfg.risk.max_trade_notional,
        max_daily_notional: cfg.risk.max_daily_notional,
        min_trade_size: cfg.risk.min_trade_size,
    };
    let risk = match storage::load_journal(None)? {
        Some(journal) => Arc::new(RiskManager::restore(limits, journal)),
        None => Arc::new(RiskManager::new(limits)),
    };

    // -- Strategy and orchestrator ----------------------------------------

    let ranker = Arc::new(ProfitabilityRanker::new(
        Arc::clone(&registry),
        Arc::clone(&quoter),
        cfg.engine.home_decimals,
    ));

    let orchestrator = Arc::new(CascadeOrchestrator::new(
        quoter,
        ledger,
        Arc::clone(&ranker),
        Arc::clone(&risk),
        Arc::clone(&registry),
        CascadeConfig {
            home_mint: cfg.engine.home_mint.clone(),
            home_decimals: cfg.engine.home_decimals,
            wrap_native: cfg.engine.wrap_native,
            signer_public_key,
        },
    ));

    // -- API server -------------------------------------------------------

    if cfg.api.enabled {
        let state = Arc::new(ServiceState {
            orchestrator: Arc::clone(&orchestrator),
            registry: Arc::clone(&registry),
            risk: Arc::clone(&risk),
            ranker: Arc::clone(&ranker),
            started_at: Utc::now(),
        });
        api::spawn_api(state, cfg.api.port)?;
    }

    // -- Score refresh loop ------------------------------------------------

    let refresh_interval = Duration::from_secs(cfg.engine.score_refresh_interval_secs);
    let mut interval = tokio::time::interval(refresh_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.score_refresh_interval_secs,
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let scored = ranker.refresh_all_scores().await;
                info!(scored, daily_volume = %risk.daily_volume(), "Refresh pass complete");

                // Persist the risk journal after each pass
                if let Err(e) = storage::save_journal(&risk.snapshot(), None) {
                    error!(error = %e, "Failed to save risk journal");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final journal
    storage::save_journal(&risk.snapshot(), None)?;
    info!(
        daily_volume = %risk.daily_volume(),
        "CASCADE shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cascade=info"));

    let json_logging = std::env::var("CASCADE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
