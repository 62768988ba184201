// Candle history: CSV loading and the in-memory store the paper exchange reads from
pub mod csv_parser;
pub mod market_data;
