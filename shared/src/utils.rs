// Helpers shared by the engine and any front end driving it.

/// Quote asset every traded pair is priced in.
pub const QUOTE_ASSET: &str = "USDT";

/// Turns a coin name ("btc", "BTC", "BTCUSDT") into its quote-pair symbol ("BTCUSDT").
pub fn to_pair_symbol(coin: &str) -> String {
    let upper = coin.trim().to_uppercase();
    if upper.ends_with(QUOTE_ASSET) && upper.len() > QUOTE_ASSET.len() {
        upper
    } else {
        format!("{}{}", upper, QUOTE_ASSET)
    }
}

/// Percentage move from `from` to `to`; 0.0 when `from` is zero.
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 0.0;
    }
    (to - from) / from * 100.0
}
