//! Stream service (C7, §4.7): wires the streaming client's demuxed
//! queues to decoders, persistence, the publisher, and checkpoint
//! updates. No single event failure tears down the pipeline.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::binance::stream_names;
use crate::binance::ws_client::WsClient;
use crate::persistence::candles::CandleRepository;
use crate::persistence::checkpoints::CheckpointRepository;
use crate::persistence::ticker::TickerRepository;
use crate::persistence::trades::TradeRepository;
use crate::publisher::Publisher;
use crate::wire::decode::{decode_stream_candle, decode_stream_depth, decode_stream_ticker, decode_stream_trade};
use crate::wire::models::DataType;

pub struct StreamService {
    ws: Arc<WsClient>,
    publisher: Arc<dyn Publisher>,
    candles: Arc<CandleRepository>,
    tickers: Arc<TickerRepository>,
    trades: Arc<TradeRepository>,
    checkpoints: Arc<CheckpointRepository>,
    persist_trades: bool,
}

impl StreamService {
    pub fn new(
        ws: Arc<WsClient>,
        publisher: Arc<dyn Publisher>,
        candles: Arc<CandleRepository>,
        tickers: Arc<TickerRepository>,
        trades: Arc<TradeRepository>,
        checkpoints: Arc<CheckpointRepository>,
        persist_trades: bool,
    ) -> Self {
        Self {
            ws,
            publisher,
            candles,
            tickers,
            trades,
            checkpoints,
            persist_trades,
        }
    }

    /// Spawn one consumer per subscribed stream, then drive the
    /// streaming client's reconnect loop until `cancel` fires.
    pub async fn run(
        &self,
        symbols: &[String],
        kline_intervals: &[String],
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut consumers = Vec::new();

        for symbol in symbols {
            for interval in kline_intervals {
                consumers.push(self.spawn_candle_consumer(symbol, interval, cancel.clone()));
            }
            consumers.push(self.spawn_ticker_consumer(symbol, cancel.clone()));
            consumers.push(self.spawn_depth_consumer(symbol, cancel.clone()));
            consumers.push(self.spawn_trade_consumer(symbol, cancel.clone()));
        }

        let ws = self.ws.clone();
        let ws_cancel = cancel.clone();
        let ws_handle = tokio::spawn(async move { ws.run(&ws_cancel).await });

        let result = ws_handle.await;
        for consumer in consumers {
            consumer.abort();
        }

        match result {
            Ok(inner) => inner,
            Err(e) => Err(anyhow::anyhow!("streaming client task panicked: {e}")),
        }
    }

    fn spawn_candle_consumer(
        &self,
        symbol: &str,
        interval: &str,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let stream = stream_names::kline(symbol, interval);
        let Some(queue) = self.ws.queue_for(&stream) else {
            warn!(stream, "no queue registered for candle stream");
            return tokio::spawn(async {});
        };

        let candles = self.candles.clone();
        let publisher = self.publisher.clone();
        let checkpoints = self.checkpoints.clone();
        let symbol = symbol.to_string();
        let interval = interval.to_string();

        tokio::spawn(async move {
            loop {
                let data = tokio::select! {
                    data = queue.recv() => data,
                    _ = cancel.cancelled() => return,
                };

                let candle = match decode_stream_candle(&data) {
                    Ok(Some(c)) => c,
                    Ok(None) => continue, // in-progress candle, candle-closed filter
                    Err(e) => {
                        warn!(symbol, interval, error = %e, "dropping malformed candle event");
                        continue;
                    }
                };

                if let Err(e) = candles.insert(&candle).await {
                    error!(symbol, interval, error = %e, "failed to persist candle");
                }
                if let Err(e) = publisher.publish_candle(&candle).await {
                    error!(symbol, interval, error = %e, "failed to publish candle");
                }
                if let Err(e) = checkpoints
                    .touch_last_data_time(&symbol, DataType::Candle, Some(&interval), candle.open_time)
                    .await
                {
                    error!(symbol, interval, error = %e, "failed to advance candle checkpoint");
                }
            }
        })
    }

    fn spawn_ticker_consumer(&self, symbol: &str, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let stream = stream_names::ticker(symbol);
        let Some(queue) = self.ws.queue_for(&stream) else {
            warn!(stream, "no queue registered for ticker stream");
            return tokio::spawn(async {});
        };

        let tickers = self.tickers.clone();
        let publisher = self.publisher.clone();
        let checkpoints = self.checkpoints.clone();
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            loop {
                let data = tokio::select! {
                    data = queue.recv() => data,
                    _ = cancel.cancelled() => return,
                };

                let ticker = match decode_stream_ticker(&data, Utc::now().timestamp_millis()) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(symbol, error = %e, "dropping malformed ticker event");
                        continue;
                    }
                };

                if let Err(e) = tickers.insert(&ticker).await {
                    error!(symbol, error = %e, "failed to persist ticker");
                }
                if let Err(e) = publisher.publish_ticker(&ticker).await {
                    error!(symbol, error = %e, "failed to publish ticker");
                }
                if let Err(e) = checkpoints
                    .touch_last_data_time(&symbol, DataType::Ticker, None, ticker.timestamp)
                    .await
                {
                    error!(symbol, error = %e, "failed to advance ticker checkpoint");
                }
            }
        })
    }

    fn spawn_depth_consumer(&self, symbol: &str, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let stream = stream_names::depth(symbol);
        let Some(queue) = self.ws.queue_for(&stream) else {
            warn!(stream, "no queue registered for depth stream");
            return tokio::spawn(async {});
        };

        let publisher = self.publisher.clone();
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            loop {
                let data = tokio::select! {
                    data = queue.recv() => data,
                    _ = cancel.cancelled() => return,
                };

                let depth = match decode_stream_depth(&data, Utc::now().timestamp_millis()) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(symbol, error = %e, "dropping malformed depth event");
                        continue;
                    }
                };

                if let Err(e) = publisher.publish_depth(&depth).await {
                    error!(symbol, error = %e, "failed to publish depth");
                }
            }
        })
    }

    fn spawn_trade_consumer(&self, symbol: &str, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let stream = stream_names::agg_trade(symbol);
        let Some(queue) = self.ws.queue_for(&stream) else {
            warn!(stream, "no queue registered for trade stream");
            return tokio::spawn(async {});
        };

        let trades = self.trades.clone();
        let publisher = self.publisher.clone();
        let persist_trades = self.persist_trades;
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            loop {
                let data = tokio::select! {
                    data = queue.recv() => data,
                    _ = cancel.cancelled() => return,
                };

                let trade = match decode_stream_trade(&data) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(symbol, error = %e, "dropping malformed trade event");
                        continue;
                    }
                };

                if let Err(e) = publisher.publish_trade(&trade).await {
                    error!(symbol, error = %e, "failed to publish trade");
                }

                if persist_trades {
                    if let Err(e) = trades.insert(&trade).await {
                        error!(symbol, error = %e, "failed to persist trade");
                    }
                }
            }
        })
    }
}
