//! Checkpoint repository (§4.4): per-series resume record, primary key
//! `(symbol, data_type, interval)`. A missing row reads as "no
//! checkpoint", never an error.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;

use crate::wire::models::{Checkpoint, CheckpointStatus, DataType};

pub struct CheckpointRepository {
    pool: PgPool,
}

impl CheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        symbol: &str,
        data_type: DataType,
        interval: Option<&str>,
    ) -> Result<Option<Checkpoint>> {
        let interval_key = Checkpoint::interval_key(interval);
        let row = sqlx::query_as::<_, CheckpointRow>(
            r#"
            SELECT symbol, data_type, interval, last_sync_time, last_data_time, status, error_message
            FROM checkpoints
            WHERE symbol = $1 AND data_type = $2 AND interval = $3
            "#,
        )
        .bind(symbol)
        .bind(data_type.as_str())
        .bind(&interval_key)
        .fetch_optional(&self.pool)
        .await
        .context("query checkpoint")?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (symbol, data_type, interval, last_sync_time, last_data_time, status, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (symbol, data_type, interval) DO UPDATE
            SET last_sync_time = EXCLUDED.last_sync_time,
                last_data_time = EXCLUDED.last_data_time,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(checkpoint.symbol.as_str())
        .bind(checkpoint.data_type.as_str())
        .bind(checkpoint.interval.as_str())
        .bind(checkpoint.last_sync_time)
        .bind(checkpoint.last_data_time)
        .bind(checkpoint.status.as_str())
        .bind(&checkpoint.error_message)
        .execute(&self.pool)
        .await
        .context("upsert checkpoint")?;

        Ok(())
    }

    /// Advance `last_data_time`, stamp `last_sync_time = now`, clear any
    /// error, and set `status = active`. Monotonic-max by convention —
    /// callers should only call this with a `t` they observed succeed.
    pub async fn touch_last_data_time(
        &self,
        symbol: &str,
        data_type: DataType,
        interval: Option<&str>,
        t: i64,
    ) -> Result<()> {
        let interval_key = Checkpoint::interval_key(interval);
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO checkpoints (symbol, data_type, interval, last_sync_time, last_data_time, status, error_message)
            VALUES ($1, $2, $3, $4, $5, 'active', NULL)
            ON CONFLICT (symbol, data_type, interval) DO UPDATE
            SET last_sync_time = EXCLUDED.last_sync_time,
                last_data_time = GREATEST(checkpoints.last_data_time, EXCLUDED.last_data_time),
                status = 'active',
                error_message = NULL
            "#,
        )
        .bind(symbol)
        .bind(data_type.as_str())
        .bind(&interval_key)
        .bind(now)
        .bind(t)
        .execute(&self.pool)
        .await
        .context("touch checkpoint last_data_time")?;

        Ok(())
    }

    /// Transition a checkpoint to `error` with a message, used by backfill
    /// when a pair fails (§7 user-visible behavior).
    pub async fn mark_error(
        &self,
        symbol: &str,
        data_type: DataType,
        interval: Option<&str>,
        message: &str,
    ) -> Result<()> {
        let interval_key = Checkpoint::interval_key(interval);
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO checkpoints (symbol, data_type, interval, last_sync_time, last_data_time, status, error_message)
            VALUES ($1, $2, $3, $4, 0, 'error', $5)
            ON CONFLICT (symbol, data_type, interval) DO UPDATE
            SET last_sync_time = EXCLUDED.last_sync_time,
                status = 'error',
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(symbol)
        .bind(data_type.as_str())
        .bind(&interval_key)
        .bind(now)
        .bind(message)
        .execute(&self.pool)
        .await
        .context("mark checkpoint error")?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    symbol: String,
    data_type: String,
    interval: String,
    last_sync_time: i64,
    last_data_time: i64,
    status: String,
    error_message: Option<String>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = anyhow::Error;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        Ok(Checkpoint {
            symbol: row.symbol,
            data_type: row.data_type.parse::<DataType>().map_err(anyhow::Error::msg)?,
            interval: row.interval,
            last_sync_time: row.last_sync_time,
            last_data_time: row.last_data_time,
            status: row.status.parse::<CheckpointStatus>().map_err(anyhow::Error::msg)?,
            error_message: row.error_message,
        })
    }
}
