//! Stream-name construction (SPEC_FULL.md §4.3, exact table).

/// `<sym-lower>@kline_<interval>`
pub fn kline(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{interval}", symbol.to_lowercase())
}

/// `<sym-lower>@ticker`
pub fn ticker(symbol: &str) -> String {
    format!("{}@ticker", symbol.to_lowercase())
}

/// `<sym-lower>@depth@1000ms`
pub fn depth(symbol: &str) -> String {
    format!("{}@depth@1000ms", symbol.to_lowercase())
}

/// `<sym-lower>@aggTrade`
pub fn agg_trade(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

/// Every stream a single active symbol subscribes to.
pub fn streams_for_symbol(symbol: &str, kline_intervals: &[String]) -> Vec<String> {
    let mut streams: Vec<String> = kline_intervals
        .iter()
        .map(|i| kline(symbol, i))
        .collect();
    streams.push(ticker(symbol));
    streams.push(depth(symbol));
    streams.push(agg_trade(symbol));
    streams
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exact_stream_names() {
        assert_eq!(kline("BTCUSDT", "1m"), "btcusdt@kline_1m");
        assert_eq!(ticker("BTCUSDT"), "btcusdt@ticker");
        assert_eq!(depth("BTCUSDT"), "btcusdt@depth@1000ms");
        assert_eq!(agg_trade("BTCUSDT"), "btcusdt@aggTrade");
    }

    #[test]
    fn streams_for_symbol_covers_every_required_stream() {
        let streams = streams_for_symbol("BTCUSDT", &["1m".to_string(), "1h".to_string()]);
        let required = [
            "btcusdt@kline_1m",
            "btcusdt@kline_1h",
            "btcusdt@ticker",
            "btcusdt@depth@1000ms",
            "btcusdt@aggTrade",
        ];
        for r in required {
            assert!(streams.iter().any(|s| s == r), "missing stream {r}");
        }
    }

    #[test]
    fn lowercases_mixed_case_symbol() {
        assert_eq!(kline("bTcUsDt", "5m"), "btcusdt@kline_5m");
    }
}
