// Decision loop: score every active symbol on a fixed interval and act on the thresholds
use super::state::BotStateHandle;
use crate::config::settings::{TraderSettings, TradingSettings};
use crate::error::LedgerError;
use crate::indicators::CompositeScorer;
use crate::ledger::PositionLedger;
use crate::services::provider::{fetch_candles_or_empty, MarketProvider};
use shared::models::BotPhase;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SIGNAL_REASON: &str = "AI Signal";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Buy(f64),
    Sell(f64),
    Hold,
}

/// Threshold policy. `held` is the open quantity for the symbol, if any.
pub fn decide(combined: f64, held: Option<f64>, open_positions: usize, policy: &TradingSettings) -> Decision {
    match held {
        None if combined > policy.buy_threshold => {
            if open_positions >= policy.max_concurrent_positions {
                Decision::Hold
            } else {
                Decision::Buy(policy.default_quantity)
            }
        }
        Some(quantity) if combined < policy.sell_threshold => Decision::Sell(quantity),
        _ => Decision::Hold,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Bought { combined: f64 },
    Sold { combined: f64, realized_pnl: f64 },
    Held { combined: f64 },
    Failed { combined: f64, error: LedgerError },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|(s, _)| s == symbol).map(|(_, o)| o)
    }
}

#[derive(Clone)]
pub struct DecisionLoop {
    settings: Arc<TraderSettings>,
    provider: Arc<dyn MarketProvider>,
    ledger: Arc<PositionLedger>,
    scorer: Arc<CompositeScorer>,
    state: BotStateHandle,
}

impl DecisionLoop {
    pub fn new(
        settings: Arc<TraderSettings>,
        provider: Arc<dyn MarketProvider>,
        ledger: Arc<PositionLedger>,
        scorer: Arc<CompositeScorer>,
        state: BotStateHandle,
    ) -> Self {
        Self { settings, provider, ledger, scorer, state }
    }

    /// Runs cycles until `shutdown` fires or the bot leaves the running phase. A cycle in
    /// progress always completes; cancellation is observed between cycles.
    pub async fn run(self, shutdown: CancellationToken) {
        let interval = self.settings.trading.poll_interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            timeframe = %self.settings.decision_timeframe,
            "Decision loop started"
        );

        loop {
            if shutdown.is_cancelled() || self.state.phase().await != BotPhase::Running {
                break;
            }
            let report = self.run_cycle().await;
            tracing::debug!(symbols = report.outcomes.len(), "Decision cycle finished");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("Decision loop stopped");
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        for symbol in self.state.active_symbols().await {
            if self.state.phase().await != BotPhase::Running {
                tracing::info!(next_symbol = %symbol, "Stop requested, ending cycle early");
                break;
            }
            let outcome = self.evaluate_symbol(&symbol).await;
            if let SymbolOutcome::Failed { error, .. } = &outcome {
                if error.is_state_violation() {
                    tracing::warn!(symbol = %symbol, error = %error, "Signal rejected by ledger");
                } else {
                    tracing::error!(symbol = %symbol, error = %error, "Signal execution failed");
                }
            }
            report.outcomes.push((symbol, outcome));
        }
        report
    }

    async fn evaluate_symbol(&self, symbol: &str) -> SymbolOutcome {
        let trading = &self.settings.trading;
        let series = fetch_candles_or_empty(
            self.provider.as_ref(),
            symbol,
            self.settings.decision_timeframe,
            trading.candle_limit,
        )
        .await;
        let score = self.scorer.score_series(&series);
        let combined = score.combined;
        self.state.record_score(symbol, combined).await;

        let held = self.ledger.position(symbol).await.map(|p| p.quantity);
        let open_positions = self.ledger.open_count().await;
        let decision = decide(combined, held, open_positions, trading);
        tracing::debug!(symbol = %symbol, combined, samples = score.samples, ?decision, "Symbol evaluated");

        // No new positions once stop has begun
        if matches!(decision, Decision::Buy(_)) && self.state.phase().await != BotPhase::Running {
            tracing::info!(symbol = %symbol, combined, "Buy signal dropped, bot is stopping");
            return SymbolOutcome::Held { combined };
        }

        match decision {
            Decision::Buy(quantity) => match self.ledger.buy(symbol, quantity, SIGNAL_REASON).await {
                Ok(_) => SymbolOutcome::Bought { combined },
                Err(error) => SymbolOutcome::Failed { combined, error },
            },
            Decision::Sell(quantity) => match self.ledger.sell(symbol, quantity, SIGNAL_REASON).await {
                Ok(receipt) => SymbolOutcome::Sold { combined, realized_pnl: receipt.realized_pnl },
                Err(error) => SymbolOutcome::Failed { combined, error },
            },
            Decision::Hold => SymbolOutcome::Held { combined },
        }
    }
}
