// =============================================================================
// Multiplexed streaming client — single connection, N logical streams
// =============================================================================
//
// One socket subscribes to every stream name at once; incoming frames are
// demultiplexed by `stream` and fanned out to a bounded, drop-oldest queue
// per stream so a slow consumer never stalls the socket read loop.
//
// State machine per connection attempt (SPEC_FULL.md §4.3):
//   Dialing -> Reading || Pinging -> (read-error | stop) -> Closing ->
//   (cooldown) -> Dialing. Terminal: Stopped (explicit close) or
//   Exhausted (reconnect attempts exceeded).
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::wire::decode::decode_frame;

/// A bounded queue that drops the oldest entry on overflow instead of
/// blocking the producer (§4.3, §9 Open Question ii).
pub struct StreamQueue<T> {
    inner: Mutex<VecDeque<T>>,
    notify: tokio::sync::Notify,
    capacity: usize,
}

impl<T> StreamQueue<T> {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            notify: tokio::sync::Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn push(&self, item: T, stream: &str) {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
            warn!(stream, capacity = self.capacity, "stream queue full, dropped oldest message");
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
    }

    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.inner.lock().pop_front() {
                return item;
            }
            self.notify.notified().await;
        }
    }
}

pub struct WsClient {
    ws_url: String,
    streams: Vec<String>,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    ping_interval: Duration,
    queues: HashMap<String, Arc<StreamQueue<Value>>>,
}

impl WsClient {
    pub fn new(
        ws_url: impl Into<String>,
        streams: Vec<String>,
        reconnect_delay_secs: u64,
        max_reconnect_attempts: u32,
        ping_interval_secs: u64,
        channel_buffer_size: usize,
    ) -> Self {
        let queues = streams
            .iter()
            .map(|s| (s.clone(), Arc::new(StreamQueue::new(channel_buffer_size))))
            .collect();

        Self {
            ws_url: ws_url.into(),
            streams,
            reconnect_delay: Duration::from_secs(reconnect_delay_secs),
            max_reconnect_attempts,
            ping_interval: Duration::from_secs(ping_interval_secs),
            queues,
        }
    }

    /// The per-stream queue a consumer task should drain. `None` if
    /// `stream` was not part of this client's subscription set.
    pub fn queue_for(&self, stream: &str) -> Option<Arc<StreamQueue<Value>>> {
        self.queues.get(stream).cloned()
    }

    fn build_url(&self) -> String {
        format!("{}/stream?streams={}", self.ws_url, self.streams.join("/"))
    }

    /// Drive the reconnect state machine until `cancel` fires or the
    /// reconnect budget is exhausted.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let url = self.build_url();
            match connect_async(&url).await {
                Ok((ws_stream, _response)) => {
                    attempts = 0;
                    info!(streams = self.streams.len(), "streaming socket connected");

                    match self.run_connection(ws_stream, cancel).await {
                        Ok(()) => return Ok(()), // Stopped: explicit cancellation
                        Err(e) => warn!(error = %e, "streaming socket closed, reconnecting"),
                    }
                }
                Err(e) => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %e, "streaming dial failed");
                    if attempts >= self.max_reconnect_attempts {
                        anyhow::bail!(
                            "streaming client exhausted {} reconnect attempts",
                            self.max_reconnect_attempts
                        );
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }

    async fn run_connection(
        &self,
        ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (mut write, mut read) = ws_stream.split();
        let mut ping_ticker = tokio::time::interval(self.ping_interval);
        ping_ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(anyhow::anyhow!("streaming socket closed by peer"));
                        }
                        Some(Ok(_)) => {} // ping/pong/binary frames carry no stream data
                        Some(Err(e)) => return Err(e).context("streaming socket read error"),
                    }
                }
                _ = ping_ticker.tick() => {
                    let result = timeout(Duration::from_secs(10), write.send(Message::Ping(Vec::new()))).await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, "failed to write ping frame"),
                        Err(_) => warn!("ping write timed out after 10s"),
                    }
                }
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let (stream, data) = match decode_frame(text) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "dropping malformed stream frame");
                return;
            }
        };

        match self.queues.get(&stream) {
            Some(queue) => queue.push(data, &stream),
            None => warn!(stream, "dropping frame for unregistered stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_streams_with_slash() {
        let client = WsClient::new(
            "wss://stream.binance.com:9443",
            vec!["btcusdt@kline_1m".to_string(), "btcusdt@ticker".to_string()],
            5,
            10,
            180,
            256,
        );
        assert_eq!(
            client.build_url(),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@kline_1m/btcusdt@ticker"
        );
    }

    #[tokio::test]
    async fn stream_queue_drops_oldest_on_overflow() {
        let queue: StreamQueue<i32> = StreamQueue::new(2);
        queue.push(1, "test");
        queue.push(2, "test");
        queue.push(3, "test"); // drops 1

        assert_eq!(queue.recv().await, 2);
        assert_eq!(queue.recv().await, 3);
    }

    #[tokio::test]
    async fn dispatch_routes_frame_to_registered_queue() {
        let client = WsClient::new(
            "wss://stream.binance.com:9443",
            vec!["btcusdt@kline_1m".to_string()],
            5,
            10,
            180,
            16,
        );
        client.dispatch(r#"{"stream":"btcusdt@kline_1m","data":{"x":true}}"#);
        let queue = client.queue_for("btcusdt@kline_1m").unwrap();
        let data = queue.recv().await;
        assert_eq!(data["x"], true);
    }

    #[test]
    fn dispatch_ignores_unregistered_stream() {
        let client = WsClient::new(
            "wss://stream.binance.com:9443",
            vec!["btcusdt@kline_1m".to_string()],
            5,
            10,
            180,
            16,
        );
        // Should not panic.
        client.dispatch(r#"{"stream":"ethusdt@ticker","data":{}}"#);
    }
}
