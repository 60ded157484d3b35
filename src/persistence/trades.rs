//! Trade repository: idempotent upserts keyed by `(symbol, trade_id, timestamp)`.
//!
//! Wired but not called by the stream service unless `trade.persist` is
//! enabled (§9 Open Question i) — the repository itself is unconditional.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::persistence::batch::{batch_upsert, ChunkUpsert};
use crate::wire::models::Trade;

pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, trade: &Trade) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        insert_query(trade).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn batch_insert(&self, trades: &[Trade], cancel: &CancellationToken) -> Result<()> {
        batch_upsert(&self.pool, self, trades, cancel).await
    }

    pub async fn last(&self, symbol: &str) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT id, symbol, trade_id, timestamp, price, qty, quote_qty, buyer_is_maker
            FROM trades
            WHERE symbol = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .context("query last trade")?;

        Ok(row.map(Into::into))
    }

    pub async fn by_time_range(&self, symbol: &str, start: i64, end: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT id, symbol, trade_id, timestamp, price, qty, quote_qty, buyer_is_maker
            FROM trades
            WHERE symbol = $1 AND timestamp >= $2 AND timestamp < $3
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("query trades by time range")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ChunkUpsert<Trade> for TradeRepository {
    async fn upsert_one(&self, tx: &mut Transaction<'_, Postgres>, trade: &Trade) -> Result<()> {
        insert_query(trade).execute(&mut **tx).await?;
        Ok(())
    }
}

fn insert_query(t: &Trade) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO trades (id, symbol, trade_id, timestamp, price, qty, quote_qty, buyer_is_maker)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (symbol, trade_id, timestamp) DO UPDATE
        SET price = EXCLUDED.price,
            qty = EXCLUDED.qty,
            quote_qty = EXCLUDED.quote_qty,
            buyer_is_maker = EXCLUDED.buyer_is_maker
        "#,
    )
    .bind(t.id)
    .bind(t.symbol.as_str())
    .bind(t.trade_id)
    .bind(t.timestamp)
    .bind(t.price)
    .bind(t.qty)
    .bind(t.quote_qty)
    .bind(t.buyer_is_maker)
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    id: Uuid,
    symbol: String,
    trade_id: i64,
    timestamp: i64,
    price: rust_decimal::Decimal,
    qty: rust_decimal::Decimal,
    quote_qty: rust_decimal::Decimal,
    buyer_is_maker: bool,
}

impl From<TradeRow> for Trade {
    fn from(row: TradeRow) -> Self {
        Trade {
            id: row.id,
            symbol: row.symbol,
            trade_id: row.trade_id,
            timestamp: row.timestamp,
            price: row.price,
            qty: row.qty,
            quote_qty: row.quote_qty,
            buyer_is_maker: row.buyer_is_maker,
        }
    }
}
