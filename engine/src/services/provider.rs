// Market-data / order-execution provider interface
use crate::error::ProviderError;
use async_trait::async_trait;
use shared::models::{CandleSeries, FillRecord, TimeFrame};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Everything the engine needs from an exchange. Implementations report failures as
/// `ProviderError`; callers decide whether to degrade or surface them.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Result<CandleSeries, ProviderError>;
    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, ProviderError>;
    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError>;
    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError>;
    async fn fetch_quote_balance(&self) -> Result<f64, ProviderError>;
}

#[async_trait]
impl<T: MarketProvider + ?Sized> MarketProvider for Arc<T> {
    async fn fetch_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Result<CandleSeries, ProviderError> {
        (**self).fetch_candles(symbol, timeframe, limit).await
    }

    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        (**self).fetch_current_price(symbol).await
    }

    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        (**self).place_market_buy(symbol, quantity).await
    }

    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        (**self).place_market_sell(symbol, quantity).await
    }

    async fn fetch_quote_balance(&self) -> Result<f64, ProviderError> {
        (**self).fetch_quote_balance().await
    }
}

/// Candles for scoring. A failed fetch is logged and scored as an empty (neutral) series.
pub async fn fetch_candles_or_empty(
    provider: &dyn MarketProvider,
    symbol: &str,
    timeframe: TimeFrame,
    limit: usize,
) -> CandleSeries {
    match provider.fetch_candles(symbol, timeframe, limit).await {
        Ok(series) => series,
        Err(e) => {
            tracing::warn!(symbol = %symbol, %timeframe, error = %e, "Candle fetch failed, scoring as neutral");
            CandleSeries::empty()
        }
    }
}

/// Bounds every call of the wrapped provider with the same timeout.
pub struct TimeoutProvider<P> {
    inner: P,
    timeout: Duration,
}

impl<P: MarketProvider> TimeoutProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(operation, timeout_ms = self.timeout.as_millis() as u64, "Provider call timed out");
                Err(ProviderError::Timeout { operation, after: self.timeout })
            }
        }
    }
}

#[async_trait]
impl<P: MarketProvider> MarketProvider for TimeoutProvider<P> {
    async fn fetch_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Result<CandleSeries, ProviderError> {
        self.bounded("fetch_candles", self.inner.fetch_candles(symbol, timeframe, limit)).await
    }

    async fn fetch_current_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        self.bounded("fetch_current_price", self.inner.fetch_current_price(symbol)).await
    }

    async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        self.bounded("place_market_buy", self.inner.place_market_buy(symbol, quantity)).await
    }

    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
        self.bounded("place_market_sell", self.inner.place_market_sell(symbol, quantity)).await
    }

    async fn fetch_quote_balance(&self) -> Result<f64, ProviderError> {
        self.bounded("fetch_quote_balance", self.inner.fetch_quote_balance()).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    // Scripted provider for exercising failure paths
    use super::*;
    use chrono::Utc;
    use shared::models::Side;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedProvider {
        pub prices: Mutex<HashMap<String, f64>>,
        pub candles: Mutex<HashMap<(String, TimeFrame), CandleSeries>>,
        pub failing_orders: Mutex<HashSet<String>>,
        pub failing_prices: Mutex<HashSet<String>>,
        pub delay: Mutex<Option<Duration>>,
        pub orders: Mutex<Vec<(Side, String, f64)>>,
    }

    impl ScriptedProvider {
        pub fn with_prices(prices: &[(&str, f64)]) -> Self {
            let provider = Self::default();
            for (symbol, price) in prices {
                provider.set_price(symbol, *price);
            }
            provider
        }

        pub fn set_price(&self, symbol: &str, price: f64) {
            self.prices.lock().unwrap().insert(symbol.to_string(), price);
        }

        pub fn set_candles(&self, symbol: &str, timeframe: TimeFrame, series: CandleSeries) {
            self.candles.lock().unwrap().insert((symbol.to_string(), timeframe), series);
        }

        pub fn fail_orders_for(&self, symbol: &str) {
            self.failing_orders.lock().unwrap().insert(symbol.to_string());
        }

        pub fn fail_prices_for(&self, symbol: &str) {
            self.failing_prices.lock().unwrap().insert(symbol.to_string());
        }

        pub fn order_count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }

        async fn maybe_delay(&self) {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        fn fill(&self, side: Side, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
            if self.failing_orders.lock().unwrap().contains(symbol) {
                return Err(ProviderError::Unavailable(format!("order endpoint down for {}", symbol)));
            }
            let price = self.price(symbol)?;
            self.orders.lock().unwrap().push((side, symbol.to_string(), quantity));
            Ok(FillRecord {
                order_id: format!("scripted-{}", self.order_count()),
                symbol: symbol.to_string(),
                side,
                price,
                quantity,
                timestamp: Utc::now(),
            })
        }

        fn price(&self, symbol: &str) -> Result<f64, ProviderError> {
            if self.failing_prices.lock().unwrap().contains(symbol) {
                return Err(ProviderError::Unavailable(format!("ticker down for {}", symbol)));
            }
            self.prices
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| ProviderError::NoMarketData { symbol: symbol.to_string() })
        }
    }

    #[async_trait]
    impl MarketProvider for ScriptedProvider {
        async fn fetch_candles(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> Result<CandleSeries, ProviderError> {
            self.maybe_delay().await;
            self.candles
                .lock()
                .unwrap()
                .get(&(symbol.to_string(), timeframe))
                .map(|s| s.tail(limit))
                .ok_or_else(|| ProviderError::NoMarketData { symbol: symbol.to_string() })
        }

        async fn fetch_current_price(&self, symbol: &str) -> Result<f64, ProviderError> {
            self.maybe_delay().await;
            self.price(symbol)
        }

        async fn place_market_buy(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
            self.maybe_delay().await;
            self.fill(Side::Buy, symbol, quantity)
        }

        async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<FillRecord, ProviderError> {
            self.maybe_delay().await;
            self.fill(Side::Sell, symbol, quantity)
        }

        async fn fetch_quote_balance(&self) -> Result<f64, ProviderError> {
            Ok(1_000.0)
        }
    }
}
