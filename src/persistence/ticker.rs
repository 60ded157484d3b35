//! Ticker repository: idempotent upserts keyed by `(symbol, timestamp)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;

use crate::persistence::batch::{batch_upsert, ChunkUpsert};
use crate::wire::models::Ticker;

pub struct TickerRepository {
    pool: PgPool,
}

impl TickerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, ticker: &Ticker) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        insert_query(ticker).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn batch_insert(&self, tickers: &[Ticker], cancel: &CancellationToken) -> Result<()> {
        batch_upsert(&self.pool, self, tickers, cancel).await
    }

    pub async fn last(&self, symbol: &str) -> Result<Option<Ticker>> {
        let row = sqlx::query_as::<_, TickerRow>(
            r#"
            SELECT symbol, timestamp, price, bid_price, bid_qty, ask_price, ask_qty,
                   volume_24h, quote_volume_24h, price_change_24h, price_change_pct_24h,
                   high_24h, low_24h, trade_count_24h
            FROM tickers
            WHERE symbol = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .context("query last ticker")?;

        Ok(row.map(Into::into))
    }

    pub async fn by_time_range(&self, symbol: &str, start: i64, end: i64) -> Result<Vec<Ticker>> {
        let rows = sqlx::query_as::<_, TickerRow>(
            r#"
            SELECT symbol, timestamp, price, bid_price, bid_qty, ask_price, ask_qty,
                   volume_24h, quote_volume_24h, price_change_24h, price_change_pct_24h,
                   high_24h, low_24h, trade_count_24h
            FROM tickers
            WHERE symbol = $1 AND timestamp >= $2 AND timestamp < $3
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("query tickers by time range")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ChunkUpsert<Ticker> for TickerRepository {
    async fn upsert_one(&self, tx: &mut Transaction<'_, Postgres>, ticker: &Ticker) -> Result<()> {
        insert_query(ticker).execute(&mut **tx).await?;
        Ok(())
    }
}

fn insert_query(t: &Ticker) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO tickers (
            symbol, timestamp, price, bid_price, bid_qty, ask_price, ask_qty,
            volume_24h, quote_volume_24h, price_change_24h, price_change_pct_24h,
            high_24h, low_24h, trade_count_24h
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (symbol, timestamp) DO UPDATE
        SET price = EXCLUDED.price,
            bid_price = EXCLUDED.bid_price,
            bid_qty = EXCLUDED.bid_qty,
            ask_price = EXCLUDED.ask_price,
            ask_qty = EXCLUDED.ask_qty,
            volume_24h = EXCLUDED.volume_24h,
            quote_volume_24h = EXCLUDED.quote_volume_24h,
            price_change_24h = EXCLUDED.price_change_24h,
            price_change_pct_24h = EXCLUDED.price_change_pct_24h,
            high_24h = EXCLUDED.high_24h,
            low_24h = EXCLUDED.low_24h,
            trade_count_24h = EXCLUDED.trade_count_24h
        "#,
    )
    .bind(t.symbol.as_str())
    .bind(t.timestamp)
    .bind(t.price)
    .bind(t.bid_price)
    .bind(t.bid_qty)
    .bind(t.ask_price)
    .bind(t.ask_qty)
    .bind(t.volume_24h)
    .bind(t.quote_volume_24h)
    .bind(t.price_change_24h)
    .bind(t.price_change_pct_24h)
    .bind(t.high_24h)
    .bind(t.low_24h)
    .bind(t.trade_count_24h)
}

#[derive(sqlx::FromRow)]
struct TickerRow {
    symbol: String,
    timestamp: i64,
    price: rust_decimal::Decimal,
    bid_price: Option<rust_decimal::Decimal>,
    bid_qty: Option<rust_decimal::Decimal>,
    ask_price: Option<rust_decimal::Decimal>,
    ask_qty: Option<rust_decimal::Decimal>,
    volume_24h: Option<rust_decimal::Decimal>,
    quote_volume_24h: Option<rust_decimal::Decimal>,
    price_change_24h: Option<rust_decimal::Decimal>,
    price_change_pct_24h: Option<rust_decimal::Decimal>,
    high_24h: Option<rust_decimal::Decimal>,
    low_24h: Option<rust_decimal::Decimal>,
    trade_count_24h: Option<i64>,
}

impl From<TickerRow> for Ticker {
    fn from(row: TickerRow) -> Self {
        Ticker {
            symbol: row.symbol,
            timestamp: row.timestamp,
            price: row.price,
            bid_price: row.bid_price,
            bid_qty: row.bid_qty,
            ask_price: row.ask_price,
            ask_qty: row.ask_qty,
            volume_24h: row.volume_24h,
            quote_volume_24h: row.quote_volume_24h,
            price_change_24h: row.price_change_24h,
            price_change_pct_24h: row.price_change_pct_24h,
            high_24h: row.high_24h,
            low_24h: row.low_24h,
            trade_count_24h: row.trade_count_24h,
        }
    }
}
