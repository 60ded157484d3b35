//! Pub/sub envelope encoders (SPEC_FULL.md §4.1, §4.5, §9).
//!
//! The envelope is `{type, symbol, timestamp, payload}`; `timestamp` is
//! always milliseconds. Inside the candle payload, `open_time` and
//! `close_time` are emitted in seconds (truncating division by 1000) —
//! a deliberate asymmetry preserved from the design notes, not a bug.
//! Two independent codecs exist for the same envelope: a compact binary
//! form (bincode) and a textual fallback (JSON) carrying the same
//! field names (§9 Polymorphic publisher). `Payload` is externally
//! tagged (`{"Candle": {...}}` in JSON) rather than carrying its own
//! `"kind"` field, because bincode can only deserialize an externally
//! tagged enum — see the comment on `Payload` below.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::wire::models::{Candle, Depth, PriceLevel, Ticker, Trade};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub symbol: String,
    pub timestamp: i64,
    pub payload: Payload,
}

// Externally tagged (the serde default — no `#[serde(tag = ...)]`):
// bincode deserializes this through `deserialize_enum`, reading a plain
// variant index off the wire. Internally- or adjacently-tagged encodings
// both require the deserializer to inspect a field before picking the
// variant's content type, which needs `deserialize_any` — bincode is a
// non-self-describing format and refuses that call outright, so either
// tagging style breaks `decode_binary` for every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Candle(CandlePayload),
    Ticker(TickerPayload),
    Depth(DepthPayload),
    Trade(TradePayload),
    SymbolRoster(SymbolRosterPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandlePayload {
    pub interval: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trade_count: i64,
    pub taker_buy_base: Decimal,
    pub taker_buy_quote: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPayload {
    pub price: Decimal,
    pub bid_price: Option<Decimal>,
    pub bid_qty: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub ask_qty: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub quote_volume_24h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub price_change_pct_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub trade_count_24h: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthPayload {
    pub last_update_id: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePayload {
    pub trade_id: i64,
    pub price: Decimal,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    pub buyer_is_maker: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRosterPayload {
    pub symbols: Vec<String>,
}

/// Truncating ms -> s conversion used only inside the candle payload.
fn to_seconds(ms: i64) -> i64 {
    ms / 1000
}

pub fn envelope_for_candle(c: &Candle) -> Envelope {
    Envelope {
        event_type: "candle".to_string(),
        symbol: c.symbol.clone(),
        timestamp: c.close_time,
        payload: Payload::Candle(CandlePayload {
            interval: c.interval.clone(),
            open_time: to_seconds(c.open_time),
            close_time: to_seconds(c.close_time),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            quote_volume: c.quote_volume,
            trade_count: c.trade_count,
            taker_buy_base: c.taker_buy_base,
            taker_buy_quote: c.taker_buy_quote,
        }),
    }
}

pub fn envelope_for_ticker(t: &Ticker) -> Envelope {
    Envelope {
        event_type: "ticker".to_string(),
        symbol: t.symbol.clone(),
        timestamp: t.timestamp,
        payload: Payload::Ticker(TickerPayload {
            price: t.price,
            bid_price: t.bid_price,
            bid_qty: t.bid_qty,
            ask_price: t.ask_price,
            ask_qty: t.ask_qty,
            volume_24h: t.volume_24h,
            quote_volume_24h: t.quote_volume_24h,
            price_change_24h: t.price_change_24h,
            price_change_pct_24h: t.price_change_pct_24h,
            high_24h: t.high_24h,
            low_24h: t.low_24h,
            trade_count_24h: t.trade_count_24h,
        }),
    }
}

pub fn envelope_for_depth(d: &Depth) -> Envelope {
    Envelope {
        event_type: "depth".to_string(),
        symbol: d.symbol.clone(),
        timestamp: d.timestamp,
        payload: Payload::Depth(DepthPayload {
            last_update_id: d.last_update_id,
            bids: d.bids.clone(),
            asks: d.asks.clone(),
        }),
    }
}

pub fn envelope_for_trade(t: &Trade) -> Envelope {
    Envelope {
        event_type: "trade".to_string(),
        symbol: t.symbol.clone(),
        timestamp: t.timestamp,
        payload: Payload::Trade(TradePayload {
            trade_id: t.trade_id,
            price: t.price,
            qty: t.qty,
            quote_qty: t.quote_qty,
            buyer_is_maker: t.buyer_is_maker,
        }),
    }
}

pub fn envelope_for_symbol_roster(symbols: &[String], now_ms: i64) -> Envelope {
    Envelope {
        event_type: "symbol_roster".to_string(),
        symbol: String::new(),
        timestamp: now_ms,
        payload: Payload::SymbolRoster(SymbolRosterPayload {
            symbols: symbols.to_vec(),
        }),
    }
}

/// Compact binary encoding — the default codec (§9 Polymorphic publisher).
pub fn encode_binary(envelope: &Envelope) -> Result<Vec<u8>, DecodeError> {
    bincode::serialize(envelope)
        .map_err(|e| DecodeError::new("wire::encode::binary", e.to_string()))
}

pub fn decode_binary(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    bincode::deserialize(bytes)
        .map_err(|e| DecodeError::new("wire::encode::binary", e.to_string()))
}

/// Textual fallback encoding carrying the same field names (§4.1).
pub fn encode_textual(envelope: &Envelope) -> Result<String, DecodeError> {
    serde_json::to_string(envelope)
        .map_err(|e| DecodeError::new("wire::encode::textual", e.to_string()))
}

pub fn decode_textual(text: &str) -> Result<Envelope, DecodeError> {
    serde_json::from_str(text)
        .map_err(|e| DecodeError::new("wire::encode::textual", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_candle() -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            open_time: 1_700_000_000_000,
            close_time: 1_700_000_059_999,
            open: d("37000.00"),
            high: d("37050.00"),
            low: d("36990.00"),
            close: d("37020.00"),
            volume: d("123.456"),
            quote_volume: d("4567890.12"),
            trade_count: 1500,
            taker_buy_base: d("60.123"),
            taker_buy_quote: d("2224455.66"),
        }
    }

    #[test]
    fn candle_envelope_converts_payload_timestamps_to_seconds() {
        let envelope = envelope_for_candle(&sample_candle());
        assert_eq!(envelope.timestamp, 1_700_000_059_999);
        match envelope.payload {
            Payload::Candle(p) => {
                assert_eq!(p.open_time, 1_700_000_000);
                assert_eq!(p.close_time, 1_700_000_059);
            }
            _ => panic!("expected candle payload"),
        }
    }

    #[test]
    fn binary_round_trip_is_stable() {
        let envelope = envelope_for_candle(&sample_candle());
        let a = encode_binary(&envelope).unwrap();
        let b = encode_binary(&envelope).unwrap();
        assert_eq!(a, b);
        let decoded = decode_binary(&a).unwrap();
        assert_eq!(decoded.symbol, "BTCUSDT");
        match decoded.payload {
            Payload::Candle(p) => assert_eq!(p.close.to_string(), "37020.00"),
            _ => panic!("expected candle payload"),
        }
    }

    #[test]
    fn textual_round_trip_preserves_field_names() {
        let envelope = envelope_for_candle(&sample_candle());
        let json = encode_textual(&envelope).unwrap();
        assert!(json.contains("\"open_time\""));
        assert!(json.contains("\"type\":\"candle\""));
        let decoded = decode_textual(&json).unwrap();
        assert_eq!(decoded.symbol, envelope.symbol);
    }

    #[test]
    fn symbol_roster_envelope_has_empty_symbol_field() {
        let envelope = envelope_for_symbol_roster(&["BTCUSDT".to_string()], 42);
        assert_eq!(envelope.symbol, "");
        assert_eq!(envelope.timestamp, 42);
    }
}
