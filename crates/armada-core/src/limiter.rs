//! Global pacing for outbound provider calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between provider requests.
///
/// GitHub's authenticated quota is 5000 requests/hour = 1.38 req/s, so one
/// request per 720ms stays under it; serializing requests also avoids
/// tripping secondary abuse detection.
pub const PROVIDER_REQUEST_INTERVAL: Duration = Duration::from_millis(720);

/// Paces callers so no two permits are issued closer together than the
/// configured interval, process-wide.
///
/// One instance is constructed per run and passed to every provider call
/// site; there is no ambient global. `acquire` only ever delays, it never
/// fails. Tests substitute [`RateLimiter::unlimited`].
pub struct RateLimiter {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter issuing at most one permit per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_permit: Mutex::new(None),
        }
    }

    /// A zero-delay limiter for tests.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Block until the next permitted slot.
    ///
    /// Safe to call from any number of concurrent workers; waiters are
    /// serialized on the internal lock, and each one sleeps out the full
    /// interval after the previous permit before taking its own.
    pub async fn acquire(&self) {
        let mut last = self.last_permit.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn concurrent_acquires_are_spaced() {
        let interval = Duration::from_millis(30);
        let limiter = Arc::new(RateLimiter::new(interval));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= interval,
                "permits {gap:?} apart, expected at least {interval:?}"
            );
        }
    }

    #[tokio::test]
    async fn unlimited_does_not_delay() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
