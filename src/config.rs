//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the wallet keypair) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

use crate::types::{PairRiskConfig, TradingPair};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub quoter: QuoterConfig,
    pub ledger: LedgerConfig,
    pub wallet: WalletConfig,
    pub risk: RiskConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub pairs: Vec<PairSeedConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Interval between profitability score refresh passes.
    pub score_refresh_interval_secs: u64,
    /// The cascade's home asset: amounts propagate between hops only when
    /// a hop returns to this mint.
    pub home_mint: String,
    /// Minor-unit scale of the home asset (9 for SOL/lamports).
    #[serde(default = "default_home_decimals")]
    pub home_decimals: u32,
    /// Whether swap transactions should wrap/unwrap the native asset.
    #[serde(default = "default_true")]
    pub wrap_native: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuoterConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// Name of the env var holding the base58-encoded signing key.
    pub keypair_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    /// Global per-trade notional ceiling, in home-asset major units.
    pub max_trade_notional: Decimal,
    /// Rolling daily notional ceiling across all trades.
    pub max_daily_notional: Decimal,
    /// Trades below this size are rejected outright.
    pub min_trade_size: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

/// A trading pair seeded from configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct PairSeedConfig {
    pub id: String,
    pub stable_mint: String,
    pub target_mint: String,
    pub rank: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub max_trade_notional: Option<Decimal>,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps_tolerance: u32,
    #[serde(default)]
    pub min_wallet_balance: Decimal,
}

impl From<PairSeedConfig> for TradingPair {
    fn from(seed: PairSeedConfig) -> Self {
        TradingPair {
            id: seed.id,
            stable_mint: seed.stable_mint,
            target_mint: seed.target_mint,
            profitability_rank: seed.rank,
            enabled: seed.enabled,
            current_profitability_score: Decimal::ZERO,
            last_updated: None,
            risk: PairRiskConfig {
                max_trade_notional: seed.max_trade_notional,
                slippage_bps_tolerance: seed.slippage_bps_tolerance,
                min_wallet_balance: seed.min_wallet_balance,
            },
        }
    }
}

fn default_home_decimals() -> u32 {
    9
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_slippage_bps() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
