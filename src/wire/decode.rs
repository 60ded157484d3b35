//! Pure decoders from exchange wire bytes to the internal record shapes
//! of [`crate::wire::models`] (SPEC_FULL.md §4.1).
//!
//! Every decoder here is fallible and side-effect free; callers decide
//! what to do with a [`crate::error::DecodeError`] (log and skip, never
//! propagate as fatal — kind 3 in SPEC_FULL.md §7).

use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::DecodeError;
use crate::wire::models::{Candle, Depth, PriceLevel, Ticker, Trade};

fn ctx(name: &str) -> String {
    format!("wire::decode::{name}")
}

fn str_field<'a>(v: &'a Value, key: &str, ctxname: &str) -> Result<&'a str, DecodeError> {
    v.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::new(ctx(ctxname), format!("missing field '{key}'")))
}

fn i64_field(v: &Value, key: &str, ctxname: &str) -> Result<i64, DecodeError> {
    v.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| DecodeError::new(ctx(ctxname), format!("missing field '{key}'")))
}

fn bool_field(v: &Value, key: &str, ctxname: &str) -> Result<bool, DecodeError> {
    v.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| DecodeError::new(ctx(ctxname), format!("missing field '{key}'")))
}

/// Parse a string or numeric JSON value into a [`Decimal`].
pub fn parse_decimal(v: &Value, ctxname: &str) -> Result<Decimal, DecodeError> {
    match v {
        Value::String(s) => s
            .parse::<Decimal>()
            .map_err(|e| DecodeError::new(ctx(ctxname), format!("bad decimal '{s}': {e}"))),
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .ok_or_else(|| DecodeError::new(ctx(ctxname), format!("bad numeric decimal: {n}"))),
        other => Err(DecodeError::new(
            ctx(ctxname),
            format!("expected string or number, got {other}"),
        )),
    }
}

fn optional_decimal(v: &Value, key: &str) -> Option<Decimal> {
    v.get(key).and_then(|field| match field {
        Value::String(s) if !s.is_empty() => s.parse::<Decimal>().ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Historical klines — GET /api/v3/klines, array-of-arrays (§4.1)
// ---------------------------------------------------------------------------

/// Decode a single row of a `/api/v3/klines` response.
///
/// Positional layout: `[0] open_time, [1] open, [2] high, [3] low,
/// [4] close, [5] volume, [6] close_time, [7] quote_volume,
/// [8] trade_count, [9] taker_buy_base, [10] taker_buy_quote, [11] ignore`.
pub fn decode_historical_candle(
    row: &Value,
    symbol: &str,
    interval: &str,
) -> Result<Candle, DecodeError> {
    let arr = row
        .as_array()
        .ok_or_else(|| DecodeError::new(ctx("historical_candle"), "row is not an array"))?;

    if arr.len() < 11 {
        return Err(DecodeError::new(
            ctx("historical_candle"),
            format!("expected >=11 elements, got {}", arr.len()),
        ));
    }

    let open_time = arr[0]
        .as_i64()
        .ok_or_else(|| DecodeError::new(ctx("historical_candle"), "bad open_time"))?;
    let close_time = arr[6]
        .as_i64()
        .ok_or_else(|| DecodeError::new(ctx("historical_candle"), "bad close_time"))?;
    let trade_count = arr[8]
        .as_i64()
        .ok_or_else(|| DecodeError::new(ctx("historical_candle"), "bad trade_count"))?;

    Ok(Candle {
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        open_time,
        close_time,
        open: parse_decimal(&arr[1], "historical_candle.open")?,
        high: parse_decimal(&arr[2], "historical_candle.high")?,
        low: parse_decimal(&arr[3], "historical_candle.low")?,
        close: parse_decimal(&arr[4], "historical_candle.close")?,
        volume: parse_decimal(&arr[5], "historical_candle.volume")?,
        quote_volume: parse_decimal(&arr[7], "historical_candle.quote_volume")?,
        trade_count,
        taker_buy_base: parse_decimal(&arr[9], "historical_candle.taker_buy_base")?,
        taker_buy_quote: parse_decimal(&arr[10], "historical_candle.taker_buy_quote")?,
    })
}

// ---------------------------------------------------------------------------
// Streaming events — short one-letter keys (§4.1)
// ---------------------------------------------------------------------------

/// Decode a `kline` streaming payload. Returns `Ok(None)` when the candle
/// is still in progress (`k.x == false`) — callers must drop those per
/// the candle-closed filter (SPEC_FULL.md §8).
pub fn decode_stream_candle(data: &Value) -> Result<Option<Candle>, DecodeError> {
    let symbol = str_field(data, "s", "stream_candle")?.to_uppercase();
    let k = data
        .get("k")
        .ok_or_else(|| DecodeError::new(ctx("stream_candle"), "missing field 'k'"))?;

    let is_closed = bool_field(k, "x", "stream_candle")?;
    if !is_closed {
        return Ok(None);
    }

    let interval = str_field(k, "i", "stream_candle")?.to_string();
    let open_time = i64_field(k, "t", "stream_candle")?;
    let close_time = i64_field(k, "T", "stream_candle")?;
    let trade_count = i64_field(k, "n", "stream_candle")?;

    Ok(Some(Candle {
        symbol,
        interval,
        open_time,
        close_time,
        open: parse_decimal(&k["o"], "stream_candle.open")?,
        high: parse_decimal(&k["h"], "stream_candle.high")?,
        low: parse_decimal(&k["l"], "stream_candle.low")?,
        close: parse_decimal(&k["c"], "stream_candle.close")?,
        volume: parse_decimal(&k["v"], "stream_candle.volume")?,
        quote_volume: parse_decimal(&k["q"], "stream_candle.quote_volume")?,
        trade_count,
        taker_buy_base: parse_decimal(&k["V"], "stream_candle.taker_buy_base")?,
        taker_buy_quote: parse_decimal(&k["Q"], "stream_candle.taker_buy_quote")?,
    }))
}

/// Decode a `24hrTicker` streaming payload.
pub fn decode_stream_ticker(data: &Value, now_ms: i64) -> Result<Ticker, DecodeError> {
    let symbol = str_field(data, "s", "stream_ticker")?.to_uppercase();
    let timestamp = data.get("E").and_then(Value::as_i64).unwrap_or(now_ms);

    Ok(Ticker {
        symbol,
        timestamp,
        price: parse_decimal(
            data.get("c")
                .ok_or_else(|| DecodeError::new(ctx("stream_ticker"), "missing field 'c'"))?,
            "stream_ticker.price",
        )?,
        bid_price: optional_decimal(data, "b"),
        bid_qty: optional_decimal(data, "B"),
        ask_price: optional_decimal(data, "a"),
        ask_qty: optional_decimal(data, "A"),
        volume_24h: optional_decimal(data, "v"),
        quote_volume_24h: optional_decimal(data, "q"),
        price_change_24h: optional_decimal(data, "p"),
        price_change_pct_24h: optional_decimal(data, "P"),
        high_24h: optional_decimal(data, "h"),
        low_24h: optional_decimal(data, "l"),
        trade_count_24h: data.get("n").and_then(Value::as_i64),
    })
}

/// Decode a `depthUpdate` streaming payload.
pub fn decode_stream_depth(data: &Value, now_ms: i64) -> Result<Depth, DecodeError> {
    let symbol = str_field(data, "s", "stream_depth")?.to_uppercase();
    let timestamp = data.get("E").and_then(Value::as_i64).unwrap_or(now_ms);
    let last_update_id = i64_field(data, "u", "stream_depth")?;

    let bids = decode_price_levels(data, "b", "stream_depth.bids")?;
    let asks = decode_price_levels(data, "a", "stream_depth.asks")?;

    Ok(Depth {
        id: Uuid::new_v4(),
        symbol,
        timestamp,
        last_update_id,
        bids,
        asks,
    })
}

fn decode_price_levels(
    data: &Value,
    key: &str,
    ctxname: &str,
) -> Result<Vec<PriceLevel>, DecodeError> {
    let arr = data
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::new(ctx(ctxname), format!("missing field '{key}'")))?;

    arr.iter()
        .map(|pair| {
            let pair = pair
                .as_array()
                .ok_or_else(|| DecodeError::new(ctx(ctxname), "level is not an array"))?;
            if pair.len() < 2 {
                return Err(DecodeError::new(ctx(ctxname), "level has fewer than 2 elements"));
            }
            Ok(PriceLevel {
                price: parse_decimal(&pair[0], ctxname)?,
                quantity: parse_decimal(&pair[1], ctxname)?,
            })
        })
        .collect()
}

/// Decode an `aggTrade` streaming payload.
pub fn decode_stream_trade(data: &Value) -> Result<Trade, DecodeError> {
    let symbol = str_field(data, "s", "stream_trade")?.to_uppercase();
    let trade_id = i64_field(data, "a", "stream_trade")?;
    let timestamp = i64_field(data, "T", "stream_trade")?;
    let price = parse_decimal(
        data.get("p")
            .ok_or_else(|| DecodeError::new(ctx("stream_trade"), "missing field 'p'"))?,
        "stream_trade.price",
    )?;
    let qty = parse_decimal(
        data.get("q")
            .ok_or_else(|| DecodeError::new(ctx("stream_trade"), "missing field 'q'"))?,
        "stream_trade.qty",
    )?;
    let buyer_is_maker = bool_field(data, "m", "stream_trade")?;

    // quote_quantity is computed when the source does not supply it (§4.7).
    let quote_qty = optional_decimal(data, "Q").unwrap_or(price * qty);

    Ok(Trade {
        id: Uuid::new_v4(),
        symbol,
        trade_id,
        timestamp,
        price,
        qty,
        quote_qty,
        buyer_is_maker,
    })
}

/// The Binance combined-stream envelope `{stream, data}` (§4.3 demux).
pub struct StreamFrame<'a> {
    pub stream: &'a str,
    pub data: &'a Value,
}

pub fn decode_frame(text: &str) -> Result<(String, Value), DecodeError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| DecodeError::new(ctx("frame"), format!("invalid JSON: {e}")))?;

    let stream = root
        .get("stream")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::new(ctx("frame"), "missing field 'stream'"))?
        .to_string();
    let data = root
        .get("data")
        .cloned()
        .ok_or_else(|| DecodeError::new(ctx("frame"), "missing field 'data'"))?;

    Ok((stream, data))
}

impl<'a> StreamFrame<'a> {
    pub fn stream_kind(&self) -> &'a str {
        // e.g. "btcusdt@kline_1m" -> "kline_1m"; "btcusdt@ticker" -> "ticker".
        self.stream.split('@').nth(1).unwrap_or(self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_historical_candle_row() {
        let row = json!([
            1700000000000i64, "37000.00", "37050.00", "36990.00", "37020.00", "123.456",
            1700000059999i64, "4567890.12", 1500, "60.123", "2224455.66", "0"
        ]);
        let candle = decode_historical_candle(&row, "BTCUSDT", "1m").unwrap();
        assert_eq!(candle.open_time, 1700000000000);
        assert_eq!(candle.close_time, 1700000059999);
        assert_eq!(candle.trade_count, 1500);
        assert_eq!(candle.close.to_string(), "37020.00");
    }

    #[test]
    fn rejects_short_historical_row() {
        let row = json!([1, 2, 3]);
        assert!(decode_historical_candle(&row, "BTCUSDT", "1m").is_err());
    }

    #[test]
    fn drops_in_progress_candle() {
        let data = json!({
            "e": "kline", "s": "BTCUSDT",
            "k": {
                "t": 1700000000000i64, "T": 1700000059999i64, "i": "1m",
                "o": "1", "h": "1", "l": "1", "c": "1", "v": "1", "q": "1",
                "n": 1, "V": "1", "Q": "1", "x": false
            }
        });
        assert!(decode_stream_candle(&data).unwrap().is_none());
    }

    #[test]
    fn decodes_closed_candle() {
        let data = json!({
            "e": "kline", "s": "btcusdt",
            "k": {
                "t": 1700000000000i64, "T": 1700000059999i64, "i": "1m",
                "o": "37000.00", "h": "37050.00", "l": "36990.00", "c": "37020.00",
                "v": "123.456", "q": "4567890.12", "n": 1500, "V": "60.123", "Q": "2224455.66",
                "x": true
            }
        });
        let candle = decode_stream_candle(&data).unwrap().unwrap();
        assert_eq!(candle.symbol, "BTCUSDT");
        assert_eq!(candle.interval, "1m");
    }

    #[test]
    fn decodes_ticker_with_nullable_fields_present() {
        let data = json!({
            "s": "ETHUSDT", "E": 1700000000000i64, "c": "2500.50",
            "b": "2500.00", "B": "1.0", "a": "2501.00", "A": "2.0",
            "v": "1000", "q": "2500000", "p": "5.5", "P": "0.22",
            "h": "2550", "l": "2480", "n": 9000
        });
        let ticker = decode_stream_ticker(&data, 0).unwrap();
        assert_eq!(ticker.symbol, "ETHUSDT");
        assert_eq!(ticker.trade_count_24h, Some(9000));
        assert!(ticker.bid_price.is_some());
    }

    #[test]
    fn decodes_depth_levels_in_order() {
        let data = json!({
            "s": "BTCUSDT", "E": 1700000000000i64, "u": 42,
            "b": [["100.0", "1.5"], ["99.0", "2.0"]],
            "a": [["101.0", "1.0"], ["102.0", "3.0"]]
        });
        let depth = decode_stream_depth(&data, 0).unwrap();
        assert_eq!(depth.last_update_id, 42);
        assert_eq!(depth.bids.len(), 2);
        assert_eq!(depth.bids[0].price.to_string(), "100.0");
        assert_eq!(depth.asks[1].price.to_string(), "102.0");
    }

    #[test]
    fn decodes_trade_and_computes_quote_qty_when_absent() {
        let data = json!({
            "s": "BTCUSDT", "a": 99, "T": 1700000000000i64,
            "p": "100.0", "q": "2.0", "m": true
        });
        let trade = decode_stream_trade(&data).unwrap();
        assert_eq!(trade.quote_qty.to_string(), "200.0");
        assert!(trade.buyer_is_maker);
    }

    #[test]
    fn stream_frame_extracts_kind() {
        let (stream, data) =
            decode_frame(r#"{"stream":"btcusdt@kline_1m","data":{"x":1}}"#).unwrap();
        let frame = StreamFrame { stream: &stream, data: &data };
        assert_eq!(frame.stream_kind(), "kline_1m");
    }
}
