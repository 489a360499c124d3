//! Outbound call rate limiting
//!
//! Sliding-window log: the limiter remembers when each permit in the current
//! window was issued and hands out a new one only while fewer than `permits`
//! fall inside the last `window`. Waiters sleep on the tokio timer until the
//! oldest relevant permit leaves the window.
//!
//! `set_rate` keeps the log, so permits already issued in the current window
//! count against the new limit. Callers already waiting re-check against the
//! new configuration when they wake.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};

struct State {
    permits: u32,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl State {
    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.issued.front() {
            if now.duration_since(front) >= self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }
}

/// At most `permits` acquisitions in any window of `window`.
pub struct RateLimiter {
    state: Mutex<State>,
}

impl RateLimiter {
    /// Limiter allowing `permits` per `window`. `permits == 0` disables
    /// limiting.
    pub fn new(permits: u32, window: Duration) -> Result<Self> {
        validate(permits, window)?;
        Ok(Self {
            state: Mutex::new(State {
                permits,
                window,
                issued: VecDeque::with_capacity(permits as usize),
            }),
        })
    }

    /// Limiter that never delays.
    pub fn unlimited() -> Self {
        Self {
            state: Mutex::new(State {
                permits: 0,
                window: Duration::ZERO,
                issued: VecDeque::new(),
            }),
        }
    }

    /// Reconfigure the limit. Takes effect on the next acquire.
    pub async fn set_rate(&self, permits: u32, window: Duration) -> Result<()> {
        validate(permits, window)?;
        let mut state = self.state.lock().await;
        state.permits = permits;
        state.window = window;
        if permits == 0 {
            state.issued.clear();
        }
        debug!(permits, window_ms = window.as_millis() as u64, "rate limit reconfigured");
        Ok(())
    }

    /// Current `(permits, window)`.
    pub async fn rate(&self) -> (u32, Duration) {
        let state = self.state.lock().await;
        (state.permits, state.window)
    }

    /// Wait for a permit.
    ///
    /// Returns `Error::Cancelled` if `cancel` fires first; a cancelled waiter
    /// consumes no permit.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let wake_at = {
                let mut state = self.state.lock().await;
                if state.permits == 0 {
                    return Ok(());
                }
                let now = Instant::now();
                state.evict_expired(now);
                if state.issued.len() < state.permits as usize {
                    state.issued.push_back(now);
                    let waited = now.duration_since(started);
                    if !waited.is_zero() {
                        trace!(
                            waited_ms = waited.as_millis() as u64,
                            "rate limit permit acquired after wait"
                        );
                    }
                    crate::metrics::record_rate_limit_wait(waited);
                    return Ok(());
                }
                // Once this entry leaves the window fewer than `permits`
                // remain inside it.
                let index = state.issued.len() - state.permits as usize;
                state.issued[index] + state.window
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

fn validate(permits: u32, window: Duration) -> Result<()> {
    if permits > 0 && window.is_zero() {
        return Err(Error::Config(format!(
            "rate limit of {permits} permits needs a non-zero window"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn extra_acquisition_waits_for_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_permits_never_delays() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        limiter.acquire(&cancel).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        limiter.acquire(&cancel).await.unwrap();

        // Third permit frees when the first leaves the window at t=1s.
        limiter.acquire(&cancel).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "elapsed: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1600), "elapsed: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquirers_never_exceed_limit() {
        const PERMITS: usize = 3;
        let window = Duration::from_secs(1);
        let limiter = Arc::new(RateLimiter::new(PERMITS as u32, window).unwrap());
        let cancel = CancellationToken::new();

        // Window already partly used.
        limiter.acquire(&cancel).await.unwrap();
        let mut granted = vec![Instant::now()];

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    limiter.acquire(&cancel).await.unwrap();
                    Instant::now()
                })
            })
            .collect();
        for task in tasks {
            granted.push(task.await.unwrap());
        }
        granted.sort();

        assert_eq!(granted.len(), 11);
        for span in granted.windows(PERMITS + 1) {
            assert!(
                span[PERMITS] - span[0] >= window,
                "{} permits granted within {:?}",
                PERMITS + 1,
                span[PERMITS] - span[0]
            );
        }
        // 11 permits at 3 per second need three full windows, not more.
        assert_eq!(granted[10] - granted[0], Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_returns_cancelled() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(10)).unwrap());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };
        tokio::time::advance(Duration::from_secs(1)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_fails_immediately() {
        let limiter = RateLimiter::unlimited();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(limiter.acquire(&cancel).await, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_keeps_issued_permits() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..2 {
            limiter.acquire(&cancel).await.unwrap();
        }

        // Two permits already used in this window; new limit is 2.
        limiter.set_rate(2, Duration::from_secs(1)).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(limiter.rate().await, (2, Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_to_unlimited_releases_waiters() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)).unwrap());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };
        tokio::task::yield_now().await;
        limiter.set_rate(0, Duration::ZERO).await.unwrap();

        // The waiter wakes at its original deadline and sees no limit.
        waiter.await.unwrap().unwrap();
    }

    #[test]
    fn zero_window_with_permits_is_rejected() {
        let err = RateLimiter::new(3, Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
