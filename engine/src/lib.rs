// Engine library root: scoring, position ledger, and the trading bot built on them

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod ledger;
pub mod services;
