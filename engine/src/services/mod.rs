// Market-data / order-execution boundary and the bot built on top of it
pub mod paper;
pub mod provider;
pub mod trading_bot;

pub use paper::PaperExchange;
pub use provider::{MarketProvider, TimeoutProvider};
pub use trading_bot::TradingBot;
