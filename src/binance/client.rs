// =============================================================================
// Binance REST API Client — public market-data endpoints, rate-limited
// =============================================================================
//
// Every call waits on the token bucket before issuing the request. A
// non-200 response whose body parses as `{code, msg}` surfaces as a typed
// [`ApiError`]; any other non-200 surfaces as [`HttpStatusError`]. The
// client does not retry — retry/skip policy belongs to the caller (C6).
// =============================================================================

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, HttpStatusError};
use crate::wire::decode::decode_historical_candle;
use crate::wire::models::{Candle, Depth, Ticker, Trade};

use super::rate_limit::RestRateLimiter;

/// Catalog entry from `/api/v3/exchangeInfo`; deliberately narrower than
/// the persisted [`crate::wire::models::Symbol`] — the operator, not the
/// exchange, owns `id`/`active`/`created_at`/`updated_at`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
}

#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    http: reqwest::Client,
    rate_limiter: RestRateLimiter,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            http,
            rate_limiter: RestRateLimiter::new(requests_per_minute),
        }
    }

    /// GET `path` (already including its query string), pacing through
    /// the rate limiter and classifying non-2xx responses.
    async fn get_json(
        &self,
        path_and_query: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        self.rate_limiter
            .acquire(cancel)
            .await
            .context("rate limit wait cancelled")?;

        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse response body for {url}"))?;

        if !status.is_success() {
            if let (Some(code), Some(msg)) = (
                body.get("code").and_then(serde_json::Value::as_i64),
                body.get("msg").and_then(serde_json::Value::as_str),
            ) {
                return Err(ApiError {
                    code,
                    msg: msg.to_string(),
                }
                .into());
            }
            return Err(HttpStatusError {
                status: status.as_u16(),
                body_prefix: body.to_string().chars().take(200).collect(),
            }
            .into());
        }

        Ok(body)
    }

    /// GET /api/v3/ping.
    #[instrument(skip(self, cancel), name = "binance::ping")]
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        self.get_json("/api/v3/ping", cancel).await?;
        Ok(())
    }

    /// GET /api/v3/time.
    #[instrument(skip(self, cancel), name = "binance::server_time")]
    pub async fn server_time(&self, cancel: &CancellationToken) -> Result<i64> {
        let body = self.get_json("/api/v3/time", cancel).await?;
        body.get("serverTime")
            .and_then(serde_json::Value::as_i64)
            .context("server time response missing 'serverTime'")
    }

    /// GET /api/v3/exchangeInfo — full symbol catalog.
    #[instrument(skip(self, cancel), name = "binance::symbol_catalog")]
    pub async fn symbol_catalog(&self, cancel: &CancellationToken) -> Result<Vec<SymbolInfo>> {
        let body = self.get_json("/api/v3/exchangeInfo", cancel).await?;
        let symbols = body
            .get("symbols")
            .context("exchangeInfo response missing 'symbols'")?;
        let entries: Vec<SymbolInfo> =
            serde_json::from_value(symbols.clone()).context("failed to parse symbol catalog")?;
        debug!(count = entries.len(), "symbol catalog fetched");
        Ok(entries)
    }

    /// GET /api/v3/klines.
    #[instrument(skip(self, cancel), name = "binance::candles")]
    pub async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<i64>,
        end: Option<i64>,
        limit: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candle>> {
        let mut qs = format!("symbol={symbol}&interval={interval}");
        if let Some(s) = start {
            qs.push_str(&format!("&startTime={s}"));
        }
        if let Some(e) = end {
            qs.push_str(&format!("&endTime={e}"));
        }
        qs.push_str(&format!("&limit={}", limit.unwrap_or(500)));

        let body = self
            .get_json(&format!("/api/v3/klines?{qs}"), cancel)
            .await?;
        let rows = body.as_array().context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_historical_candle(row, symbol, interval) {
                Ok(c) => candles.push(c),
                Err(e) => warn!(symbol, interval, error = %e, "skipping malformed kline row"),
            }
        }

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /api/v3/ticker/24hr. `symbol = None` fetches every symbol.
    #[instrument(skip(self, cancel), name = "binance::ticker_24h")]
    pub async fn ticker_24h(
        &self,
        symbol: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Ticker>> {
        use crate::wire::decode::decode_stream_ticker;

        let path = match symbol {
            Some(s) => format!("/api/v3/ticker/24hr?symbol={s}"),
            None => "/api/v3/ticker/24hr".to_string(),
        };
        let body = self.get_json(&path, cancel).await?;

        let rows: Vec<serde_json::Value> = match body {
            serde_json::Value::Array(arr) => arr,
            single => vec![single],
        };

        let mut tickers = Vec::with_capacity(rows.len());
        for row in &rows {
            // The REST shape uses the same field names as the streaming
            // `24hrTicker` event, so the streaming decoder is reused here.
            let row_ts = row
                .get("closeTime")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            match decode_stream_ticker(row, row_ts) {
                Ok(t) => tickers.push(t),
                Err(e) => warn!(error = %e, "skipping malformed ticker row"),
            }
        }
        Ok(tickers)
    }

    /// GET /api/v3/depth — order book snapshot.
    #[instrument(skip(self, cancel), name = "binance::depth")]
    pub async fn depth(
        &self,
        symbol: &str,
        limit: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Depth> {
        use crate::wire::models::PriceLevel;

        let qs = format!("symbol={symbol}&limit={}", limit.unwrap_or(100));
        let body = self.get_json(&format!("/api/v3/depth?{qs}"), cancel).await?;

        let last_update_id = body
            .get("lastUpdateId")
            .and_then(serde_json::Value::as_i64)
            .context("depth response missing 'lastUpdateId'")?;

        let parse_side = |key: &str| -> Result<Vec<PriceLevel>> {
            let arr = body
                .get(key)
                .and_then(serde_json::Value::as_array)
                .with_context(|| format!("depth response missing '{key}'"))?;
            arr.iter()
                .map(|pair| {
                    let pair = pair.as_array().context("depth level is not an array")?;
                    let price: rust_decimal::Decimal = pair[0]
                        .as_str()
                        .context("depth price is not a string")?
                        .parse()
                        .context("bad depth price")?;
                    let quantity: rust_decimal::Decimal = pair[1]
                        .as_str()
                        .context("depth quantity is not a string")?
                        .parse()
                        .context("bad depth quantity")?;
                    Ok(PriceLevel { price, quantity })
                })
                .collect()
        };

        Ok(Depth {
            id: uuid::Uuid::new_v4(),
            symbol: symbol.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            last_update_id,
            bids: parse_side("bids")?,
            asks: parse_side("asks")?,
        })
    }

    /// GET /api/v3/aggTrades.
    #[instrument(skip(self, cancel), name = "binance::agg_trades")]
    pub async fn agg_trades(
        &self,
        symbol: &str,
        start: Option<i64>,
        end: Option<i64>,
        limit: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trade>> {
        let mut qs = format!("symbol={symbol}");
        if let Some(s) = start {
            qs.push_str(&format!("&startTime={s}"));
        }
        if let Some(e) = end {
            qs.push_str(&format!("&endTime={e}"));
        }
        qs.push_str(&format!("&limit={}", limit.unwrap_or(500)));

        let body = self
            .get_json(&format!("/api/v3/aggTrades?{qs}"), cancel)
            .await?;
        let rows = body
            .as_array()
            .context("aggTrades response is not an array")?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_agg_trade_rest(row, symbol) {
                Ok(t) => trades.push(t),
                Err(e) => warn!(symbol, error = %e, "skipping malformed aggTrade row"),
            }
        }
        Ok(trades)
    }
}

/// The REST `/api/v3/aggTrades` shape reuses the streaming field names
/// (`a`, `p`, `q`, `T`, `m`) but is not wrapped in a `{stream, data}`
/// envelope, so it gets its own thin adapter rather than sharing the
/// streaming decoder directly.
fn decode_agg_trade_rest(
    row: &serde_json::Value,
    symbol: &str,
) -> Result<Trade, crate::error::DecodeError> {
    use crate::error::DecodeError;
    use crate::wire::decode::parse_decimal;

    let trade_id = row
        .get("a")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| DecodeError::new("binance::agg_trades", "missing field 'a'"))?;
    let timestamp = row
        .get("T")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| DecodeError::new("binance::agg_trades", "missing field 'T'"))?;
    let price = parse_decimal(
        row.get("p")
            .ok_or_else(|| DecodeError::new("binance::agg_trades", "missing field 'p'"))?,
        "binance::agg_trades.price",
    )?;
    let qty = parse_decimal(
        row.get("q")
            .ok_or_else(|| DecodeError::new("binance::agg_trades", "missing field 'q'"))?,
        "binance::agg_trades.qty",
    )?;
    let buyer_is_maker = row
        .get("m")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| DecodeError::new("binance::agg_trades", "missing field 'm'"))?;

    Ok(Trade {
        id: uuid::Uuid::new_v4(),
        symbol: symbol.to_string(),
        trade_id,
        timestamp,
        price,
        qty,
        quote_qty: price * qty,
        buyer_is_maker,
    })
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_agg_trade_rest_row() {
        let row = json!({"a": 1, "p": "100.0", "q": "2.0", "T": 1700000000000i64, "m": false});
        let trade = decode_agg_trade_rest(&row, "BTCUSDT").unwrap();
        assert_eq!(trade.trade_id, 1);
        assert_eq!(trade.quote_qty.to_string(), "200.0");
    }

    #[test]
    fn rejects_agg_trade_row_missing_price() {
        let row = json!({"a": 1, "q": "2.0", "T": 1700000000000i64, "m": false});
        assert!(decode_agg_trade_rest(&row, "BTCUSDT").is_err());
    }
}
