// Paper exchange: market orders fill at the latest stored close against a simulated quote balance
use crate::data::market_data::MarketDataStore;
use crate::error::ProviderError;
use crate::services::provider::MarketProvider;
use async_trait::async_trait;
use chrono::Utc;
use shared::models::{CandleSeries, FillRecord, Side, TimeFrame};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub struct PaperExchange {
    market_data_store: Arc<RwLock<MarketDataStore>>,
    quote_balance: Mutex<f64>,
}

impl PaperExchange {
    pub fn new(market_data_store: Arc<RwLock<MarketDataStore>>, initial_balance: f64) -> Self {
        PaperExchange { market_data_store, quote_balance: Mutex::new(initial_balance) }
    }

    pub fn market_data_store(&self) -> Arc<RwLock<MarketDataStore>> {
        self.market_data_store.clone()
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let store = self.market_data_store.read().await;
        store
            .latest_close(symbol)
            .ok_or_else(|| ProviderError::NoMarketData { symbol: symbol.to_string() })
    }

    async fn fill(&self, side: Side, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(ProviderError::Rejected(format!("quantity must be positive, got {}", quantity)));
        }
        let price = self.latest_price(symbol).await?;
        let notional = price * quantity;

        let mut balance = self.quote_balance.lock().await;
        match side {
            Side::Buy => {
                if notional > *balance {
                    tracing::warn!(symbol = %symbol, notional, balance = *balance, "Paper buy rejected for insufficient balance");
                    return Err(ProviderError::InsufficientBalance { needed: notional, available: *balance });
                }
                *balance -= notional;
            }
            Side::Sell => *balance += notional,
        }

        let fill = FillRecord {
            order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            timestamp: Utc::now(),
        };
        tracing::info!(order_id = %fill.order_id, symbol = %symbol, %side, quantity, price, balance = *balance, "Paper order filled");
        Ok(fill)
    }
}

#[async_trait]
impl MarketProvider for PaperExchange {
    async fn fetch_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Result<CandleSeries, ProviderError> {
        let store = self.market_data_store.read().await;
        store
            .get_candles(symbol, timeframe, limit)
            .ok_or_else(|| ProviderError::NoMarketData { symbol: symbol.to_string() })
    }

    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        self.latest_price(symbol).await
    }

    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        self.fill(Side::Buy, symbol, quantity).await
    }

    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        self.fill(Side::Sell, symbol, quantity).await
    }

    async fn fetch_quote_balance(&self) -> Result<f64, ProviderError> {
        Ok(*self.quote_balance.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::models::Candle;

    fn candle(symbol: &str, hour: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.timestamp_opt(hour * 3600, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        }
    }

    async fn exchange_with(symbol: &str, closes: &[f64], balance: f64) -> PaperExchange {
        let mut store = MarketDataStore::new();
        let candles = closes.iter().enumerate().map(|(i, c)| candle(symbol, i as i64, *c)).collect();
        store.add_candles(symbol, TimeFrame::Hour1, candles);
        PaperExchange::new(Arc::new(RwLock::new(store)), balance)
    }

    #[tokio::test]
    async fn test_market_buy_fills_at_latest_close() {
        let exchange = exchange_with("BTCUSDT", &[100.0, 101.0, 102.5], 1_000.0).await;
        let fill = exchange.place_market_buy("BTCUSDT", 2.0).await.unwrap();
        assert_eq!(fill.price, 102.5);
        assert_eq!(fill.quantity, 2.0);
        assert_eq!(fill.side, Side::Buy);
        assert!(!fill.order_id.is_empty());
        assert_eq!(exchange.fetch_quote_balance().await.unwrap(), 1_000.0 - 205.0);
    }

    #[tokio::test]
    async fn test_market_sell_credits_balance() {
        let exchange = exchange_with("BTCUSDT", &[50.0], 0.0).await;
        exchange.place_market_sell("BTCUSDT", 3.0).await.unwrap();
        assert_eq!(exchange.fetch_quote_balance().await.unwrap(), 150.0);
    }

    #[tokio::test]
    async fn test_buy_rejected_for_insufficient_balance() {
        let exchange = exchange_with("BTCUSDT", &[100.0], 50.0).await;
        let err = exchange.place_market_buy("BTCUSDT", 1.0).await.unwrap_err();
        assert_eq!(err, ProviderError::InsufficientBalance { needed: 100.0, available: 50.0 });
        assert_eq!(exchange.fetch_quote_balance().await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn test_no_market_data() {
        let exchange = exchange_with("BTCUSDT", &[100.0], 50.0).await;
        assert!(matches!(
            exchange.fetch_current_price("ETHUSDT").await,
            Err(ProviderError::NoMarketData { .. })
        ));
        assert!(exchange.fetch_candles("BTCUSDT", TimeFrame::Day1, 10).await.is_err());
        assert_eq!(exchange.fetch_candles("BTCUSDT", TimeFrame::Hour1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_follows_new_candles() {
        let exchange = exchange_with("ETHUSDT", &[3000.0], 0.0).await;
        {
            let store = exchange.market_data_store();
            let mut store = store.write().await;
            store.add_candles("ETHUSDT", TimeFrame::Hour1, vec![candle("ETHUSDT", 5, 3300.0)]);
        }
        assert_eq!(exchange.fetch_current_price("ETHUSDT").await.unwrap(), 3300.0);
    }
}
