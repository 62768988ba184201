// Trading bot controller: the operations a dashboard or CLI drives
pub mod decision_loop;
pub mod state;

use crate::config::settings::TraderSettings;
use crate::error::{EngineError, LedgerError};
use crate::indicators::CompositeScorer;
use crate::ledger::{BuyReceipt, CloseAllSummary, PositionLedger, SellReceipt};
use crate::services::provider::{fetch_candles_or_empty, MarketProvider, TimeoutProvider};
use decision_loop::DecisionLoop;
use shared::models::{BotStatus, TimeFrame, TimeframeScore, Trade};
use shared::utils::to_pair_symbol;
use state::{BotStateHandle, RunTransition};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const MANUAL_REASON: &str = "Manual";

struct Worker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Signals the loop and waits up to `grace` for the current cycle to finish.
    async fn stop(mut self, grace: Duration) {
        self.shutdown.cancel();
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Decision loop task failed"),
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Decision loop did not stop in time, aborting");
                self.handle.abort();
            }
        }
    }
}

pub struct TradingBot {
    settings: Arc<TraderSettings>,
    provider: Arc<dyn MarketProvider>,
    ledger: Arc<PositionLedger>,
    scorer: Arc<CompositeScorer>,
    state: BotStateHandle,
    worker: Mutex<Option<Worker>>,
}

impl TradingBot {
    /// Every provider call made by the bot, including the ledger's, is bounded by
    /// `trading.provider_timeout_secs`.
    pub fn new(settings: TraderSettings, provider: Arc<dyn MarketProvider>) -> Self {
        let provider: Arc<dyn MarketProvider> =
            Arc::new(TimeoutProvider::new(provider, settings.trading.provider_timeout()));
        let scorer = Arc::new(CompositeScorer::from_settings(&settings));
        TradingBot {
            ledger: Arc::new(PositionLedger::new(provider.clone())),
            settings: Arc::new(settings),
            provider,
            scorer,
            state: BotStateHandle::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn ledger(&self) -> Arc<PositionLedger> {
        self.ledger.clone()
    }

    /// Scores `coin` on every configured timeframe. Timeframes without data score neutral.
    pub async fn analyze(&self, coin: &str) -> BTreeMap<TimeFrame, TimeframeScore> {
        let symbol = to_pair_symbol(coin);
        let mut series_by_timeframe = BTreeMap::new();
        for timeframe in &self.settings.timeframes {
            let series =
                fetch_candles_or_empty(self.provider.as_ref(), &symbol, *timeframe, self.settings.trading.candle_limit)
                    .await;
            series_by_timeframe.insert(*timeframe, series);
        }
        let scores = self.scorer.score_timeframes(&series_by_timeframe);
        tracing::info!(symbol = %symbol, timeframes = scores.len(), "Analysis complete");
        scores
    }

    /// Starts the decision loop over `coins`, or the configured symbols when empty.
    /// Returns the normalized symbols being traded.
    pub async fn start(&self, coins: &[String]) -> Result<Vec<String>, EngineError> {
        let coins = if coins.is_empty() { &self.settings.trading.symbols[..] } else { coins };
        let mut symbols: Vec<String> = coins.iter().map(|c| to_pair_symbol(c)).collect();
        symbols.sort();
        symbols.dedup();

        let mut worker = self.worker.lock().await;
        self.state.set_running(RunTransition::Start(symbols.clone())).await?;

        let shutdown = CancellationToken::new();
        let decisions = DecisionLoop::new(
            self.settings.clone(),
            self.provider.clone(),
            self.ledger.clone(),
            self.scorer.clone(),
            self.state.clone(),
        );
        let handle = tokio::spawn(decisions.run(shutdown.clone()));
        *worker = Some(Worker { shutdown, handle });

        tracing::info!(symbols = ?symbols, "Trading bot started");
        Ok(symbols)
    }

    /// Stops the decision loop, then force-closes every open position. The bot reports
    /// running until the close-out has finished.
    pub async fn stop(&self) -> Result<CloseAllSummary, EngineError> {
        let mut worker = self.worker.lock().await;
        self.state.set_running(RunTransition::BeginStop).await?;
        if let Some(worker) = worker.take() {
            worker.stop(self.settings.trading.stop_grace()).await;
        }

        let summary = self.ledger.close_all().await;
        self.state.set_running(RunTransition::FinishStop).await?;
        tracing::info!(
            closed = summary.closed().count(),
            failed = summary.failed().count(),
            total_pnl = summary.total_pnl(),
            "Trading bot stopped"
        );
        Ok(summary)
    }

    pub async fn status(&self) -> BotStatus {
        let state = self.state.snapshot().await;
        let quote_balance = match self.provider.fetch_quote_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(error = %e, "Balance unavailable for status");
                None
            }
        };
        BotStatus {
            running: state.running(),
            phase: state.phase,
            active_symbols: state.active_symbols.into_iter().collect(),
            last_update: state.last_update,
            last_scores: state.last_scores,
            positions: self.ledger.positions().await,
            realized_pnl: self.ledger.realized_pnl_total().await,
            quote_balance,
        }
    }

    pub async fn manual_buy(&self, coin: &str, quantity: f64) -> Result<BuyReceipt, LedgerError> {
        self.ledger.buy(&to_pair_symbol(coin), quantity, MANUAL_REASON).await
    }

    pub async fn manual_sell(&self, coin: &str, quantity: f64) -> Result<SellReceipt, LedgerError> {
        self.ledger.sell(&to_pair_symbol(coin), quantity, MANUAL_REASON).await
    }

    pub async fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.ledger.trades(limit).await
    }

    pub async fn balance(&self) -> Result<f64, EngineError> {
        Ok(self.provider.fetch_quote_balance().await?)
    }
}
