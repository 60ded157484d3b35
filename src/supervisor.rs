//! Process supervisor (C8, §4.8): startup sequencing, external-service
//! probe, lifecycle, graceful shutdown. Only startup-phase errors here
//! are fatal — everything downstream is scoped to its own item.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backfill::{BackfillCoordinator, Pair};
use crate::binance::client::BinanceClient;
use crate::binance::stream_names::streams_for_symbol;
use crate::binance::ws_client::WsClient;
use crate::config::AppConfig;
use crate::error::StartupError;
use crate::persistence::candles::CandleRepository;
use crate::persistence::checkpoints::CheckpointRepository;
use crate::persistence::pool;
use crate::persistence::symbols::SymbolRepository;
use crate::persistence::ticker::TickerRepository;
use crate::persistence::trades::TradeRepository;
use crate::publisher::codec::Codec;
use crate::publisher::{Publisher, RedisPublisher};
use crate::stream_service::StreamService;

/// Injected migration hook. The supervisor does not know how to run
/// `.sql` files itself — it only calls this if the operational shell
/// configured one, and logs and continues otherwise (§4.8).
pub type MigrationRunner = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

pub struct Supervisor {
    config: AppConfig,
    migration_runner: Option<MigrationRunner>,
}

impl Supervisor {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            migration_runner: None,
        }
    }

    pub fn with_migration_runner(mut self, runner: MigrationRunner) -> Self {
        self.migration_runner = Some(runner);
        self
    }

    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let config = self.config;

        info!(db_host = %config.database.host, "connecting to the database pool");
        let db_pool = pool::connect(&config.database).await?;

        match &self.migration_runner {
            Some(runner) => {
                info!("running configured migration hook");
                runner()?;
            }
            None => info!("no migration runner configured, skipping"),
        }

        info!(redis_host = %config.redis.host, "connecting to the pub/sub bus");
        let publisher: Arc<dyn Publisher> =
            Arc::new(RedisPublisher::connect(&config.redis, Codec::Binary).await?);

        let symbols_repo = Arc::new(SymbolRepository::new(db_pool.clone()));
        let candles_repo = Arc::new(CandleRepository::new(db_pool.clone()));
        let tickers_repo = Arc::new(TickerRepository::new(db_pool.clone()));
        let trades_repo = Arc::new(TradeRepository::new(db_pool.clone()));
        let checkpoints_repo = Arc::new(CheckpointRepository::new(db_pool.clone()));

        let http_client = Arc::new(BinanceClient::new(
            config.binance.api_url.clone(),
            config.binance.rest_rate_limit,
        ));

        info!("probing exchange connectivity");
        http_client
            .ping(&cancel)
            .await
            .map_err(|e| StartupError::ServiceUnreachable(e.to_string()))?;

        let active_symbols = symbols_repo.active_symbols().await?;
        if active_symbols.is_empty() {
            return Err(StartupError::NoActiveSymbols.into());
        }
        let symbol_names: Vec<String> = active_symbols.iter().map(|s| s.symbol.clone()).collect();
        info!(count = symbol_names.len(), symbols = ?symbol_names, "active symbols loaded");

        publisher
            .publish_symbol_roster(&symbol_names, chrono::Utc::now().timestamp_millis())
            .await?;

        if config.sync.enabled {
            info!("backfill enabled, catching up candle history");
            let coordinator = BackfillCoordinator::new(
                http_client.clone(),
                candles_repo.clone(),
                checkpoints_repo.clone(),
                config.sync.workers,
                config.sync.max_sync_hours,
                config.sync.batch_size,
            );
            let pairs: Vec<Pair> = symbol_names
                .iter()
                .flat_map(|symbol| {
                    config.binance.kline_intervals.iter().map(move |interval| Pair {
                        symbol: symbol.clone(),
                        interval: interval.clone(),
                    })
                })
                .collect();
            let error_count = coordinator.run(pairs, &cancel).await;
            if error_count > 0 {
                warn!(error_count, "backfill completed with pair failures");
            }
        } else {
            info!("backfill disabled (sync.enabled = false)");
        }

        let mut all_streams = Vec::new();
        for symbol in &symbol_names {
            all_streams.extend(streams_for_symbol(symbol, &config.binance.kline_intervals));
        }

        let ws_client = Arc::new(WsClient::new(
            config.binance.ws_url.clone(),
            all_streams,
            config.stream.reconnect_delay,
            config.stream.max_reconnect_attempts,
            config.stream.ping_interval,
            config.stream.channel_buffer_size,
        ));

        let stream_service = StreamService::new(
            ws_client,
            publisher.clone(),
            candles_repo.clone(),
            tickers_repo.clone(),
            trades_repo.clone(),
            checkpoints_repo.clone(),
            config.trade.persist,
        );

        info!("starting stream service");
        let stream_result = stream_service
            .run(&symbol_names, &config.binance.kline_intervals, cancel)
            .await;

        info!("closing database pool");
        db_pool.close().await;

        // An explicit cancellation unwinds as `Ok(())` and is a graceful
        // shutdown (exit 0). Anything else — in particular the streaming
        // client exhausting its reconnect budget — is kind 1 escalated to
        // fatal (§7) and must propagate so the process exits 1 (§6).
        match stream_result {
            Ok(()) => {
                info!("supervisor shutdown complete");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "stream service exited with an unrecoverable error");
                Err(e)
            }
        }
    }
}
