// Position ledger: open positions, the append-only trade log and realized P&L.
//
// Each symbol moves FLAT -> OPEN -> FLAT. The whole transition, provider calls included,
// runs under one lock so a manual order racing the decision loop cannot open a second
// position for the same symbol.
use crate::error::{LedgerError, ProviderError};
use crate::services::provider::MarketProvider;
use serde::Serialize;
use shared::models::{FillRecord, Position, Side, Trade};
use shared::utils::pct_change;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CLOSE_ALL_REASON: &str = "Close All";

// Remainders below this are treated as a fully closed position.
const QUANTITY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyReceipt {
    pub fill: FillRecord,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellReceipt {
    pub fill: FillRecord,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub realized_pnl: f64,
    pub pnl_pct: f64,
    /// Quantity still open after this sell; 0.0 once the position is closed.
    pub remaining_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CloseOutcome {
    Closed(SellReceipt),
    Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CloseAllSummary {
    pub results: BTreeMap<String, CloseOutcome>,
}

impl CloseAllSummary {
    pub fn closed(&self) -> impl Iterator<Item = (&String, &SellReceipt)> {
        self.results.iter().filter_map(|(symbol, outcome)| match outcome {
            CloseOutcome::Closed(receipt) => Some((symbol, receipt)),
            CloseOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&String, &str)> {
        self.results.iter().filter_map(|(symbol, outcome)| match outcome {
            CloseOutcome::Failed { error } => Some((symbol, error.as_str())),
            CloseOutcome::Closed(_) => None,
        })
    }

    pub fn total_pnl(&self) -> f64 {
        self.closed().map(|(_, receipt)| receipt.realized_pnl).sum()
    }
}

#[derive(Default)]
struct LedgerState {
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    next_trade_id: u64,
}

impl LedgerState {
    fn append_trade(&mut self, mut trade: Trade) {
        self.next_trade_id += 1;
        trade.id = self.next_trade_id;
        self.trades.push(trade);
    }
}

pub struct PositionLedger {
    provider: Arc<dyn MarketProvider>,
    state: Mutex<LedgerState>,
}

fn validate_quantity(symbol: &str, quantity: f64) -> Result<(), LedgerError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidQuantity { symbol: symbol.to_string(), quantity })
    }
}

impl PositionLedger {
    pub fn new(provider: Arc<dyn MarketProvider>) -> Self {
        PositionLedger { provider, state: Mutex::new(LedgerState::default()) }
    }

    /// Opens a position for `symbol`. Fails with `AlreadyOpen` instead of replacing an
    /// existing one.
    pub async fn buy(&self, symbol: &str, quantity: f64, reason: &str) -> Result<BuyReceipt, LedgerError> {
        validate_quantity(symbol, quantity)?;
        let mut state = self.state.lock().await;
        if state.positions.contains_key(symbol) {
            tracing::warn!(symbol = %symbol, reason = %reason, "Buy rejected: position already open");
            return Err(LedgerError::AlreadyOpen { symbol: symbol.to_string() });
        }

        let price = self
            .provider
            .fetch_current_price(symbol)
            .await
            .map_err(|e| log_provider_failure(symbol, Side::Buy, e))?;
        let fill = self
            .provider
            .place_market_buy(symbol, quantity)
            .await
            .map_err(|e| log_provider_failure(symbol, Side::Buy, e))?;

        let position = Position {
            symbol: symbol.to_string(),
            entry_price: price,
            quantity,
            opened_at: fill.timestamp,
            reason: reason.to_string(),
        };
        state.positions.insert(symbol.to_string(), position.clone());
        state.append_trade(Trade {
            id: 0,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            price,
            timestamp: fill.timestamp,
            reason: reason.to_string(),
            realized_pnl: None,
            pnl_pct: None,
        });

        tracing::info!(symbol = %symbol, quantity, price, order_id = %fill.order_id, reason = %reason, "Buy executed");
        Ok(BuyReceipt { fill, position })
    }

    /// Sells `quantity` of the open position and realizes `(exit - entry) * quantity`.
    /// Selling less than the held quantity leaves the remainder open.
    pub async fn sell(&self, symbol: &str, quantity: f64, reason: &str) -> Result<SellReceipt, LedgerError> {
        validate_quantity(symbol, quantity)?;
        let mut state = self.state.lock().await;
        let Some(position) = state.positions.get(symbol).cloned() else {
            tracing::warn!(symbol = %symbol, reason = %reason, "Sell rejected: no open position");
            return Err(LedgerError::NoOpenPosition { symbol: symbol.to_string() });
        };
        if quantity > position.quantity + QUANTITY_EPSILON {
            return Err(LedgerError::QuantityExceedsPosition {
                symbol: symbol.to_string(),
                requested: quantity,
                held: position.quantity,
            });
        }

        let exit_price = self
            .provider
            .fetch_current_price(symbol)
            .await
            .map_err(|e| log_provider_failure(symbol, Side::Sell, e))?;
        let fill = self
            .provider
            .place_market_sell(symbol, quantity)
            .await
            .map_err(|e| log_provider_failure(symbol, Side::Sell, e))?;

        let realized_pnl = (exit_price - position.entry_price) * quantity;
        let pnl_pct = pct_change(position.entry_price, exit_price);
        let remaining_quantity = position.quantity - quantity;
        let remaining_quantity = if remaining_quantity <= QUANTITY_EPSILON {
            state.positions.remove(symbol);
            0.0
        } else {
            if let Some(open) = state.positions.get_mut(symbol) {
                open.quantity = remaining_quantity;
            }
            remaining_quantity
        };
        state.append_trade(Trade {
            id: 0,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
            price: exit_price,
            timestamp: fill.timestamp,
            reason: reason.to_string(),
            realized_pnl: Some(realized_pnl),
            pnl_pct: Some(pnl_pct),
        });

        tracing::info!(
            symbol = %symbol,
            quantity,
            price = exit_price,
            pnl = realized_pnl,
            pnl_pct,
            remaining = remaining_quantity,
            reason = %reason,
            "Sell executed"
        );
        Ok(SellReceipt {
            fill,
            entry_price: position.entry_price,
            exit_price,
            quantity,
            realized_pnl,
            pnl_pct,
            remaining_quantity,
        })
    }

    /// Sells every open position. A failure on one symbol is recorded and the rest are
    /// still closed.
    pub async fn close_all(&self) -> CloseAllSummary {
        let open: Vec<(String, f64)> = {
            let state = self.state.lock().await;
            state.positions.values().map(|p| (p.symbol.clone(), p.quantity)).collect()
        };

        let mut summary = CloseAllSummary::default();
        for (symbol, quantity) in open {
            let outcome = match self.sell(&symbol, quantity, CLOSE_ALL_REASON).await {
                Ok(receipt) => CloseOutcome::Closed(receipt),
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Failed to close position");
                    CloseOutcome::Failed { error: e.to_string() }
                }
            };
            summary.results.insert(symbol, outcome);
        }
        tracing::info!(
            closed = summary.closed().count(),
            failed = summary.failed().count(),
            pnl = summary.total_pnl(),
            "Close-all finished"
        );
        summary
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.state.lock().await.positions.values().cloned().collect()
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.state.lock().await.positions.get(symbol).cloned()
    }

    pub async fn open_count(&self) -> usize {
        self.state.lock().await.positions.len()
    }

    /// The most recent `limit` trades, oldest first.
    pub async fn trades(&self, limit: usize) -> Vec<Trade> {
        let state = self.state.lock().await;
        let start = state.trades.len().saturating_sub(limit);
        state.trades[start..].to_vec()
    }

    pub async fn realized_pnl_total(&self) -> f64 {
        self.state.lock().await.trades.iter().filter_map(|t| t.realized_pnl).sum()
    }
}

fn log_provider_failure(symbol: &str, side: Side, error: ProviderError) -> LedgerError {
    tracing::error!(symbol = %symbol, %side, error = %error, "Order failed at provider");
    LedgerError::Provider(error)
}
