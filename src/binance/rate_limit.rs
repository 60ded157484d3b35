// =============================================================================
// Rate Limiter — proactive token bucket pacing for the REST client
// =============================================================================
//
// Binance enforces a request-weight ceiling per minute. Rather than react
// to `X-MBX-USED-WEIGHT-1M` after the fact, every call waits for a token
// up front: burst capacity `R` (the configured requests-per-minute
// ceiling), refilled at `R/60` tokens per second.
// =============================================================================

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Token-bucket pacer shared by every endpoint on [`super::client::BinanceClient`].
#[derive(Clone)]
pub struct RestRateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RestRateLimiter {
    /// `requests_per_minute` becomes both the burst size and the basis of
    /// the refill rate (`governor`'s `per_minute` quota replenishes one
    /// cell every `60s / requests_per_minute`, which is exactly `R/60`
    /// tokens per second).
    pub fn new(requests_per_minute: u32) -> Self {
        let n = NonZeroU32::new(requests_per_minute.max(1)).expect("max(1) is never zero");
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(n))),
        }
    }

    /// Wait for a token, honoring `cancel`. A cancelled context aborts the
    /// wait with a cancellation error (§5).
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            _ = self.limiter.until_ready() => Ok(()),
            _ = cancel.cancelled() => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_without_cancellation() {
        let limiter = RestRateLimiter::new(1200);
        let cancel = CancellationToken::new();
        assert!(limiter.acquire(&cancel).await.is_ok());
    }

    #[tokio::test]
    async fn acquire_is_cancellable_while_waiting() {
        let limiter = RestRateLimiter::new(1);
        let cancel = CancellationToken::new();
        // Spend the single burst token.
        limiter.acquire(&cancel).await.unwrap();

        cancel.cancel();
        assert!(limiter.acquire(&cancel).await.is_err());
    }
}
