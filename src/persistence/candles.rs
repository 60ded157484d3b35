//! Candle repository: idempotent upserts keyed by `(symbol, interval, open_time)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;

use crate::persistence::batch::{batch_upsert, ChunkUpsert};
use crate::wire::models::Candle;

pub struct CandleRepository {
    pool: PgPool,
}

impl CandleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, candle: &Candle) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        insert_query(candle).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn batch_insert(&self, candles: &[Candle], cancel: &CancellationToken) -> Result<()> {
        batch_upsert(&self.pool, self, candles, cancel).await
    }

    pub async fn last(&self, symbol: &str, interval: &str) -> Result<Option<Candle>> {
        let row = sqlx::query_as::<_, CandleRow>(
            r#"
            SELECT symbol, interval, open_time, close_time, open, high, low, close,
                   volume, quote_volume, trade_count, taker_buy_base, taker_buy_quote
            FROM candles
            WHERE symbol = $1 AND interval = $2
            ORDER BY open_time DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .fetch_optional(&self.pool)
        .await
        .context("query last candle")?;

        Ok(row.map(Into::into))
    }

    pub async fn by_time_range(
        &self,
        symbol: &str,
        interval: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            r#"
            SELECT symbol, interval, open_time, close_time, open, high, low, close,
                   volume, quote_volume, trade_count, taker_buy_base, taker_buy_quote
            FROM candles
            WHERE symbol = $1 AND interval = $2 AND open_time >= $3 AND open_time < $4
            ORDER BY open_time ASC
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("query candles by time range")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ChunkUpsert<Candle> for CandleRepository {
    async fn upsert_one(&self, tx: &mut Transaction<'_, Postgres>, candle: &Candle) -> Result<()> {
        insert_query(candle).execute(&mut **tx).await?;
        Ok(())
    }
}

fn insert_query(candle: &Candle) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO candles (
            symbol, interval, open_time, close_time, open, high, low, close,
            volume, quote_volume, trade_count, taker_buy_base, taker_buy_quote
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (symbol, interval, open_time) DO UPDATE
        SET close_time = EXCLUDED.close_time,
            open = EXCLUDED.open,
            high = EXCLUDED.high,
            low = EXCLUDED.low,
            close = EXCLUDED.close,
            volume = EXCLUDED.volume,
            quote_volume = EXCLUDED.quote_volume,
            trade_count = EXCLUDED.trade_count,
            taker_buy_base = EXCLUDED.taker_buy_base,
            taker_buy_quote = EXCLUDED.taker_buy_quote
        "#,
    )
    .bind(candle.symbol.as_str())
    .bind(candle.interval.as_str())
    .bind(candle.open_time)
    .bind(candle.close_time)
    .bind(candle.open)
    .bind(candle.high)
    .bind(candle.low)
    .bind(candle.close)
    .bind(candle.volume)
    .bind(candle.quote_volume)
    .bind(candle.trade_count)
    .bind(candle.taker_buy_base)
    .bind(candle.taker_buy_quote)
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    symbol: String,
    interval: String,
    open_time: i64,
    close_time: i64,
    open: rust_decimal::Decimal,
    high: rust_decimal::Decimal,
    low: rust_decimal::Decimal,
    close: rust_decimal::Decimal,
    volume: rust_decimal::Decimal,
    quote_volume: rust_decimal::Decimal,
    trade_count: i64,
    taker_buy_base: rust_decimal::Decimal,
    taker_buy_quote: rust_decimal::Decimal,
}

impl From<CandleRow> for Candle {
    fn from(row: CandleRow) -> Self {
        Candle {
            symbol: row.symbol,
            interval: row.interval,
            open_time: row.open_time,
            close_time: row.close_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            quote_volume: row.quote_volume,
            trade_count: row.trade_count,
            taker_buy_base: row.taker_buy_base,
            taker_buy_quote: row.taker_buy_quote,
        }
    }
}
