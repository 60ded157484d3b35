//! Chunked, bounded-lifetime batched writes (§4.4).
//!
//! Every repository's `batch_insert` funnels through here: split into
//! sub-batches of at most [`MAX_BATCH_SIZE`], run each in its own
//! transaction with a 30s deadline, and insert a short delay between
//! chunks to relieve connection pressure. A chunk either commits whole
//! or rolls back whole; chunks already committed are never undone. The
//! `committed` flag gates the rollback call so it is never issued after
//! a successful commit (§4.4 item 3).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Cancelled;

pub const MAX_BATCH_SIZE: usize = 100;
const CHUNK_TIMEOUT: Duration = Duration::from_secs(30);
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(200);

/// Implemented once per repository; `upsert_one` binds a single record
/// inside the caller-managed transaction.
#[async_trait]
pub trait ChunkUpsert<T: Send + Sync> {
    async fn upsert_one(&self, tx: &mut Transaction<'_, Postgres>, record: &T) -> Result<()>;
}

pub async fn batch_upsert<T, R>(
    pool: &PgPool,
    repo: &R,
    records: &[T],
    cancel: &CancellationToken,
) -> Result<()>
where
    T: Send + Sync,
    R: ChunkUpsert<T> + Sync,
{
    for chunk in records.chunks(MAX_BATCH_SIZE) {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        let mut tx = pool.begin().await.context("begin batch transaction")?;
        let mut committed = false;

        let result = timeout(CHUNK_TIMEOUT, async {
            for record in chunk {
                repo.upsert_one(&mut tx, record).await?;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tx.commit().await.context("commit batch chunk")?;
                committed = true;
            }
            Ok(Err(e)) => {
                if !committed {
                    let _ = tx.rollback().await;
                }
                return Err(e);
            }
            Err(_) => {
                if !committed {
                    let _ = tx.rollback().await;
                }
                anyhow::bail!("batch chunk exceeded the 30s transaction deadline");
            }
        }

        debug!(chunk_size = chunk.len(), "batch chunk committed");

        tokio::select! {
            _ = tokio::time::sleep(INTER_CHUNK_DELAY) => {}
            _ = cancel.cancelled() => return Err(Cancelled.into()),
        }
    }

    Ok(())
}
