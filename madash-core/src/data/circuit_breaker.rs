//! Circuit breaker for the market-data provider.
//!
//! HTTP 403 (IP ban) trips the breaker at once; three consecutive failures
//! (429s, 5xx) trip it as well. While open, every request is refused until
//! the cooldown (30 minutes by default) has passed.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Consecutive failures that trip the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// How long the breaker stays open once tripped.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD)
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    // A panic while holding the lock leaves plain counters behind; keep going.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether a request may be sent now. Closes the breaker once the
    /// cooldown has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    tracing::info!("circuit breaker cooldown elapsed, closing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
            tracing::warn!(
                failures = inner.consecutive_failures,
                "circuit breaker tripped"
            );
        }
    }

    /// Open the breaker immediately.
    pub fn trip(&self) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
        tracing::warn!("circuit breaker tripped (provider refused access)");
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Time until requests are allowed again; zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => {
                self.cooldown.saturating_sub(tripped_at.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(Duration::from_secs(60), DEFAULT_FAILURE_THRESHOLD)
    }

    #[test]
    fn starts_closed() {
        let cb = breaker();
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn trips_on_third_failure() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn forbidden_trips_immediately() {
        let cb = breaker();
        cb.trip();
        assert!(!cb.is_allowed());
        assert!(matches!(cb.state(), BreakerState::Open { .. }));
    }

    #[test]
    fn success_resets_count() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn closes_after_cooldown() {
        let cb = CircuitBreaker::new(Duration::from_millis(10), 1);
        cb.record_failure();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), BreakerState::Closed);
    }
}
