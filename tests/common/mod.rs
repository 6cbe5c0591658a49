//! Deterministic stub gateways for integration testing.
//!
//! Provide scripted quote and ledger behaviour with no external
//! dependencies: queued quote outcomes, per-mint balances, queued swap
//! outcomes, and a record of everything submitted — all controllable
//! from test code.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use cascade::engine::{CascadeConfig, CascadeOrchestrator};
use cascade::error::{GatewayError, SwapError};
use cascade::gateways::{LedgerGateway, QuoteGateway};
use cascade::pairs::PairRegistry;
use cascade::strategy::ranker::ProfitabilityRanker;
use cascade::strategy::risk::{RiskLimits, RiskManager};
use cascade::types::{PairRiskConfig, Quote, SwapTransaction, TradingPair};

pub const HOME_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

// ---------------------------------------------------------------------------
// Quote gateway stub
// ---------------------------------------------------------------------------

enum QuoteScript {
    Quote { output_minor: u64, impact: Decimal },
    Error(String),
}

/// A quote gateway with scripted responses. Unscripted calls return an
/// identity quote (output equals input) with 0.1% impact.
pub struct StubQuoteGateway {
    script: Mutex<VecDeque<QuoteScript>>,
    /// Input mints of every quote served, in order.
    pub quoted: Mutex<Vec<String>>,
    /// Number of swap transactions built.
    pub builds: Mutex<usize>,
    fail_build: Mutex<Option<String>>,
}

impl StubQuoteGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            quoted: Mutex::new(Vec::new()),
            builds: Mutex::new(0),
            fail_build: Mutex::new(None),
        }
    }

    /// Queue the next quote outcome.
    pub fn push_quote(&self, output_minor: u64, impact: Decimal) {
        self.script
            .lock()
            .unwrap()
            .push_back(QuoteScript::Quote { output_minor, impact });
    }

    /// Queue a quote failure.
    pub fn push_quote_error(&self, msg: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(QuoteScript::Error(msg.to_string()));
    }

    /// Make all subsequent swap builds fail.
    pub fn fail_builds(&self, msg: &str) {
        *self.fail_build.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl QuoteGateway for StubQuoteGateway {
    async fn fetch_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_minor: u64,
        slippage_bps: u32,
    ) -> Result<Quote, GatewayError> {
        self.quoted.lock().unwrap().push(input_mint.to_string());

        let (output_amount, price_impact_pct) = match self.script.lock().unwrap().pop_front() {
            Some(QuoteScript::Quote { output_minor, impact }) => (output_minor, impact),
            Some(QuoteScript::Error(msg)) => {
                return Err(GatewayError::Api {
                    service: "stub-quoter",
                    status: 502,
                    body: msg,
                })
            }
            None => (amount_minor, dec!(0.1)),
        };

        Ok(Quote {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            input_amount: amount_minor,
            output_amount,
            price_impact_pct,
            slippage_bps,
            route: serde_json::json!({"stub": true}),
        })
    }

    async fn build_swap(
        &self,
        quote: Quote,
        _signer_public_key: &str,
        _wrap_native: bool,
    ) -> Result<SwapTransaction, GatewayError> {
        if let Some(msg) = self.fail_build.lock().unwrap().clone() {
            return Err(GatewayError::Api {
                service: "stub-quoter",
                status: 500,
                body: msg,
            });
        }
        *self.builds.lock().unwrap() += 1;
        Ok(SwapTransaction {
            transaction_base64: format!("tx-{}-{}", quote.input_mint, quote.output_amount),
            last_valid_block_height: 100,
        })
    }
}

// ---------------------------------------------------------------------------
// Ledger gateway stub
// ---------------------------------------------------------------------------

enum SwapScript {
    Confirmed,
    OnChain(String),
    Unconfirmed(String),
}

/// A ledger with per-mint balances and scripted swap outcomes.
/// Unscripted swaps confirm with a generated signature.
pub struct StubLedgerGateway {
    balances: Mutex<HashMap<String, Decimal>>,
    default_balance: Decimal,
    script: Mutex<VecDeque<SwapScript>>,
    /// Every transaction executed, in order.
    pub executed: Mutex<Vec<SwapTransaction>>,
}

impl StubLedgerGateway {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            default_balance: dec!(1000),
            script: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, mint: &str, balance: Decimal) {
        self.balances.lock().unwrap().insert(mint.to_string(), balance);
    }

    /// Queue an on-chain execution failure for the next swap.
    pub fn push_on_chain_failure(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(SwapScript::OnChain(reason.to_string()));
    }

    /// Queue a submitted-but-unconfirmed outcome for the next swap.
    pub fn push_unconfirmed(&self, signature: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(SwapScript::Unconfirmed(signature.to_string()));
    }

    pub fn executed_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerGateway for StubLedgerGateway {
    async fn execute_swap(&self, tx: SwapTransaction) -> Result<String, SwapError> {
        self.executed.lock().unwrap().push(tx);
        let serial = self.executed.lock().unwrap().len();

        match self.script.lock().unwrap().pop_front() {
            Some(SwapScript::Confirmed) | None => Ok(format!("sig-{serial}")),
            Some(SwapScript::OnChain(reason)) => Err(SwapError::OnChain {
                signature: format!("sig-{serial}"),
                reason,
            }),
            Some(SwapScript::Unconfirmed(signature)) => Err(SwapError::Unconfirmed {
                signature,
                attempts: 30,
            }),
        }
    }

    async fn get_balance(&self, mint: &str) -> Result<Decimal, GatewayError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .unwrap_or(self.default_balance))
    }

    async fn verify_minimum_balance(
        &self,
        mint: &str,
        minimum: Decimal,
    ) -> Result<bool, GatewayError> {
        Ok(self.get_balance(mint).await? >= minimum)
    }
}

// ---------------------------------------------------------------------------
// Engine assembly helpers
// ---------------------------------------------------------------------------

/// A pair whose hop returns to the home asset.
pub fn home_pair(id: &str, rank: u32) -> TradingPair {
    TradingPair {
        id: id.to_string(),
        stable_mint: USDC_MINT.to_string(),
        target_mint: HOME_MINT.to_string(),
        profitability_rank: rank,
        enabled: true,
        current_profitability_score: Decimal::ZERO,
        last_updated: None,
        risk: PairRiskConfig::default(),
    }
}

pub fn default_limits() -> RiskLimits {
    RiskLimits {
        max_trade_notional: dec!(100),
        max_daily_notional: dec!(1000),
        min_trade_size: dec!(0.01),
    }
}

pub struct TestEngine {
    pub orchestrator: Arc<CascadeOrchestrator>,
    pub registry: Arc<PairRegistry>,
    pub risk: Arc<RiskManager>,
    pub ranker: Arc<ProfitabilityRanker>,
    pub quoter: Arc<StubQuoteGateway>,
    pub ledger: Arc<StubLedgerGateway>,
}

/// Assemble a full engine over stub gateways.
pub async fn build_engine(pairs: Vec<TradingPair>, risk: RiskManager) -> TestEngine {
    let quoter = Arc::new(StubQuoteGateway::new());
    let ledger = Arc::new(StubLedgerGateway::new());
    let registry = Arc::new(PairRegistry::new());
    for pair in pairs {
        registry.add_pair(pair).await.unwrap();
    }
    let risk = Arc::new(risk);
    let quoter_dyn: Arc<dyn QuoteGateway> = Arc::clone(&quoter);
    let ledger_dyn: Arc<dyn LedgerGateway> = Arc::clone(&ledger);
    let ranker = Arc::new(ProfitabilityRanker::new(
        Arc::clone(&registry),
        Arc::clone(&quoter_dyn),
        9,
    ));
    let orchestrator = Arc::new(CascadeOrchestrator::new(
        quoter_dyn,
        ledger_dyn,
        Arc::clone(&ranker),
        Arc::clone(&risk),
        Arc::clone(&registry),
        CascadeConfig {
            home_mint: HOME_MINT.to_string(),
            home_decimals: 9,
            wrap_native: true,
            signer_public_key: "StubSigner1111".to_string(),
        },
    ));

    TestEngine {
        orchestrator,
        registry,
        risk,
        ranker,
        quoter,
        ledger,
    }
}
