//! Publisher (C5): publish every event, refresh a TTL'd latest-value
//! cache. Two codecs share one capability set, picked once at
//! construction and held behind `Arc<dyn Publisher>` (§9).

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::config::RedisSection;
use crate::publisher::codec::Codec;
use crate::publisher::topics;
use crate::wire::encode::{
    envelope_for_candle, envelope_for_depth, envelope_for_symbol_roster, envelope_for_ticker,
    envelope_for_trade,
};
use crate::wire::models::{Candle, Depth, Ticker, Trade};

/// §4.5: TTL=0 in config means "use the default", not "expire immediately".
const DEFAULT_LIVE_DATA_TTL: u64 = 60;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_candle(&self, candle: &Candle) -> Result<()>;
    async fn publish_ticker(&self, ticker: &Ticker) -> Result<()>;
    async fn publish_depth(&self, depth: &Depth) -> Result<()>;
    async fn publish_trade(&self, trade: &Trade) -> Result<()>;
    async fn publish_symbol_roster(&self, symbols: &[String], now_ms: i64) -> Result<()>;
}

pub struct RedisPublisher {
    conn: ConnectionManager,
    codec: Codec,
    live_data_ttl: u64,
}

impl RedisPublisher {
    pub async fn connect(cfg: &RedisSection, codec: Codec) -> Result<Self> {
        let client = redis::Client::open(cfg.connection_string())
            .context("failed to build redis client")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect redis connection manager")?;

        let live_data_ttl = if cfg.live_data_ttl == 0 {
            DEFAULT_LIVE_DATA_TTL
        } else {
            cfg.live_data_ttl
        };

        Ok(Self {
            conn,
            codec,
            live_data_ttl,
        })
    }

    /// Publish is load-bearing (errors propagate); the latest-value cache
    /// write is best-effort (errors are logged, never propagated, §4.5).
    async fn publish_and_cache(
        &self,
        topic: &str,
        latest_key: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(topic)
            .arg(&bytes)
            .query_async::<_, i64>(&mut conn)
            .await
            .with_context(|| format!("failed to publish on topic {topic}"))?;

        if let Some(key) = latest_key {
            if let Err(e) = redis::cmd("SET")
                .arg(key)
                .arg(&bytes)
                .arg("EX")
                .arg(self.live_data_ttl)
                .query_async::<_, ()>(&mut conn)
                .await
            {
                warn!(key, error = %e, "failed to refresh latest-value cache");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish_candle(&self, candle: &Candle) -> Result<()> {
        let envelope = envelope_for_candle(candle);
        let bytes = self.codec.encode(&envelope).context("encode candle envelope")?;
        self.publish_and_cache(
            &topics::candle_topic(&candle.symbol, &candle.interval),
            Some(&topics::candle_latest_key(&candle.symbol, &candle.interval)),
            bytes,
        )
        .await
    }

    async fn publish_ticker(&self, ticker: &Ticker) -> Result<()> {
        let envelope = envelope_for_ticker(ticker);
        let bytes = self.codec.encode(&envelope).context("encode ticker envelope")?;
        self.publish_and_cache(
            &topics::ticker_topic(&ticker.symbol),
            Some(&topics::ticker_latest_key(&ticker.symbol)),
            bytes,
        )
        .await
    }

    async fn publish_depth(&self, depth: &Depth) -> Result<()> {
        let envelope = envelope_for_depth(depth);
        let bytes = self.codec.encode(&envelope).context("encode depth envelope")?;
        self.publish_and_cache(
            &topics::depth_topic(&depth.symbol),
            Some(&topics::depth_latest_key(&depth.symbol)),
            bytes,
        )
        .await
    }

    async fn publish_trade(&self, trade: &Trade) -> Result<()> {
        let envelope = envelope_for_trade(trade);
        let bytes = self.codec.encode(&envelope).context("encode trade envelope")?;
        self.publish_and_cache(&topics::trade_topic(&trade.symbol), None, bytes)
            .await
    }

    async fn publish_symbol_roster(&self, symbols: &[String], now_ms: i64) -> Result<()> {
        let envelope = envelope_for_symbol_roster(symbols, now_ms);
        let bytes = self
            .codec
            .encode(&envelope)
            .context("encode symbol roster envelope")?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(topics::SYMBOL_ROSTER_KEY)
            .arg(&bytes)
            .query_async::<_, ()>(&mut conn)
            .await
            .context("failed to write active-symbol roster")?;
        Ok(())
    }
}
