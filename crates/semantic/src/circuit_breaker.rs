//! Circuit breaker guarding a remote embedding provider.
//!
//! After `failure_threshold` consecutive failures the breaker opens and calls fail fast with
//! [`SemanticError::CircuitOpen`](crate::SemanticError::CircuitOpen). Once `reset_timeout` has
//! passed a single probe is let through (half-open); its outcome closes or re-opens the circuit.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    #[serde(with = "crate::serde_millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Inner {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::Closed { failures: 0 }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask to make a call, moving Open -> HalfOpen once the timeout elapsed.
    ///
    /// Returns `None` while the circuit is open or a probe is already in flight. The permit
    /// must be settled with [`CallPermit::succeeded`] or [`CallPermit::failed`]; a half-open
    /// probe dropped unsettled counts as a failure so the circuit re-opens instead of waiting
    /// on a probe that will never report.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.lock();
        match *inner {
            Inner::Closed { .. } => Some(CallPermit::new(self, false)),
            Inner::HalfOpen => None,
            Inner::Open { since } => {
                if since.elapsed() >= self.config.reset_timeout {
                    *inner = Inner::HalfOpen;
                    Some(CallPermit::new(self, true))
                } else {
                    None
                }
            }
        }
    }

    pub fn record_success(&self) {
        *self.lock() = Inner::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        let next = match *inner {
            Inner::Closed { failures } if failures + 1 < self.config.failure_threshold => {
                Inner::Closed {
                    failures: failures + 1,
                }
            }
            _ => Inner::Open {
                since: Instant::now(),
            },
        };
        if matches!(next, Inner::Open { .. }) && !matches!(*inner, Inner::Open { .. }) {
            tracing::warn!(
                threshold = self.config.failure_threshold,
                "embedding circuit opened"
            );
        }
        *inner = next;
    }

    pub fn state(&self) -> CircuitState {
        match *self.lock() {
            Inner::Closed { .. } => CircuitState::Closed,
            Inner::Open { .. } => CircuitState::Open,
            Inner::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

/// One admitted call. See [`CircuitBreaker::try_acquire`].
#[derive(Debug)]
#[must_use = "settle the permit with `succeeded` or `failed`"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// Whether this call is the single half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            tracing::debug!("half-open probe abandoned, re-opening circuit");
            self.breaker.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(threshold)
                .with_reset_timeout(Duration::from_millis(reset_ms)),
        )
    }

    #[test]
    fn opens_after_threshold() {
        let cb = breaker(2, 10_000);
        cb.record_failure();
        assert!(cb.try_acquire().is_some());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(2, 10_000);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_after_timeout() {
        let cb = breaker(1, 5);
        cb.record_failure();
        assert!(cb.try_acquire().is_none());
        std::thread::sleep(Duration::from_millis(15));
        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // only one probe at a time
        assert!(cb.try_acquire().is_none());
        probe.succeeded();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens() {
        let cb = breaker(1, 5);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        cb.try_acquire().unwrap().failed();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn abandoned_probe_reopens_then_recovers() {
        let cb = breaker(1, 5);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(15));
        cb.try_acquire().unwrap().succeeded();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn abandoned_closed_call_records_nothing() {
        let cb = breaker(1, 10_000);
        for _ in 0..3 {
            let permit = cb.try_acquire().unwrap();
            assert!(!permit.is_probe());
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
