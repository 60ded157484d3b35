//! Backfill coordinator (C6, §4.6): bring every active `(symbol,
//! interval)` pair's candles up to "now" from the later of the
//! checkpoint's `last_data_time` or `now - max_sync_hours`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backfill::intervals::duration_ms;
use crate::binance::client::BinanceClient;
use crate::error::Cancelled;
use crate::persistence::candles::CandleRepository;
use crate::persistence::checkpoints::CheckpointRepository;
use crate::wire::models::DataType;

const STAGGER_DELAY: Duration = Duration::from_millis(50);
const INTER_BATCH_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Pair {
    pub symbol: String,
    pub interval: String,
}

#[derive(Clone)]
pub struct BackfillCoordinator {
    client: Arc<BinanceClient>,
    candles: Arc<CandleRepository>,
    checkpoints: Arc<CheckpointRepository>,
    workers: usize,
    max_sync_hours: i64,
    batch_size: u32,
}

impl BackfillCoordinator {
    pub fn new(
        client: Arc<BinanceClient>,
        candles: Arc<CandleRepository>,
        checkpoints: Arc<CheckpointRepository>,
        workers: usize,
        max_sync_hours: i64,
        batch_size: u32,
    ) -> Self {
        Self {
            client,
            candles,
            checkpoints,
            workers,
            max_sync_hours,
            batch_size,
        }
    }

    /// Run every pair to completion. Returns the number of pairs that
    /// failed; individual failures never abort other pairs.
    pub async fn run(&self, pairs: Vec<Pair>, cancel: &CancellationToken) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut handles = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let semaphore = semaphore.clone();
            let this = self.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return true,
                };
                tokio::time::sleep(STAGGER_DELAY).await;

                match this.backfill_pair(&pair, &cancel).await {
                    Ok(()) => false,
                    Err(e) => {
                        warn!(symbol = %pair.symbol, interval = %pair.interval, error = %e, "backfill pair failed");
                        let _ = this
                            .checkpoints
                            .mark_error(&pair.symbol, DataType::Candle, Some(&pair.interval), &e.to_string())
                            .await;
                        true
                    }
                }
            }));
        }

        let mut error_count = 0;
        for handle in handles {
            match handle.await {
                Ok(failed) => {
                    if failed {
                        error_count += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "backfill worker task panicked");
                    error_count += 1;
                }
            }
        }

        info!(error_count, "backfill pass complete");
        error_count
    }

    async fn backfill_pair(&self, pair: &Pair, cancel: &CancellationToken) -> anyhow::Result<()> {
        let now = Utc::now().timestamp_millis();
        let checkpoint = self
            .checkpoints
            .get(&pair.symbol, DataType::Candle, Some(&pair.interval))
            .await?;

        let floor = now - self.max_sync_hours * 3_600_000;
        let mut start = checkpoint.map(|c| c.last_data_time).unwrap_or(0).max(floor);
        let end = now;
        let step = duration_ms(&pair.interval) * i64::from(self.batch_size);

        while start < end {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }

            let batch_end = (start + step).min(end);
            let rows = self
                .client
                .candles(
                    &pair.symbol,
                    &pair.interval,
                    Some(start),
                    Some(batch_end),
                    Some(self.batch_size),
                    cancel,
                )
                .await?;

            if rows.is_empty() {
                break;
            }

            self.candles.batch_insert(&rows, cancel).await?;
            let last_open_time = rows.last().expect("checked non-empty above").open_time;
            self.checkpoints
                .touch_last_data_time(&pair.symbol, DataType::Candle, Some(&pair.interval), last_open_time)
                .await?;

            start = batch_end;

            tokio::select! {
                _ = tokio::time::sleep(INTER_BATCH_DELAY) => {}
                _ = cancel.cancelled() => return Err(Cancelled.into()),
            }
        }

        Ok(())
    }
}
