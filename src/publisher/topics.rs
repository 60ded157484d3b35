//! Topic and latest-cache key layout (§4.5, exact table).

pub fn candle_topic(symbol: &str, interval: &str) -> String {
    format!("binance:kline:{symbol}:{interval}")
}

pub fn candle_latest_key(symbol: &str, interval: &str) -> String {
    format!("binance:latest:kline:{symbol}:{interval}")
}

pub fn ticker_topic(symbol: &str) -> String {
    format!("binance:ticker:{symbol}")
}

pub fn ticker_latest_key(symbol: &str) -> String {
    format!("binance:latest:ticker:{symbol}")
}

pub fn depth_topic(symbol: &str) -> String {
    format!("binance:depth:{symbol}")
}

pub fn depth_latest_key(symbol: &str) -> String {
    format!("binance:latest:depth:{symbol}")
}

pub fn trade_topic(symbol: &str) -> String {
    format!("binance:trade:{symbol}")
}

pub const SYMBOL_ROSTER_KEY: &str = "binance:symbols:active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_layout_matches_the_table() {
        assert_eq!(candle_topic("BTCUSDT", "1m"), "binance:kline:BTCUSDT:1m");
        assert_eq!(candle_latest_key("BTCUSDT", "1m"), "binance:latest:kline:BTCUSDT:1m");
        assert_eq!(ticker_topic("BTCUSDT"), "binance:ticker:BTCUSDT");
        assert_eq!(ticker_latest_key("BTCUSDT"), "binance:latest:ticker:BTCUSDT");
        assert_eq!(depth_topic("BTCUSDT"), "binance:depth:BTCUSDT");
        assert_eq!(depth_latest_key("BTCUSDT"), "binance:latest:depth:BTCUSDT");
        assert_eq!(trade_topic("BTCUSDT"), "binance:trade:BTCUSDT");
        assert_eq!(SYMBOL_ROSTER_KEY, "binance:symbols:active");
    }
}
