//! Circuit breaker: fail fast once a dependency keeps failing.
//!
//! One breaker guards one provider for the lifetime of the process:
//! - Closed: calls pass through; consecutive failures are counted
//! - Open: calls are rejected with [`CircuitOpenError`] until the cooldown elapses
//! - Half-Open: exactly one probe call is let through to test recovery
//!
//! The synchronous [`CircuitBreaker::call`] and asynchronous
//! [`CircuitBreaker::call_async`] share the same admission and outcome
//! bookkeeping; they differ only in how the wrapped operation is invoked.

use rose_core::CircuitOpenError;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Rejecting calls
    Open,
    /// Letting a single probe through
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    probe_in_flight: bool,
}

/// A thread-safe circuit breaker for one external dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker. A `failure_threshold` of 0 is treated as 1.
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Current state. An elapsed cooldown is only acted on by the next call.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.lock().last_failure_time
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed);
        inner.failure_count = 0;
        inner.last_failure_time = None;
        inner.probe_in_flight = false;
    }

    /// Guard a synchronous call.
    ///
    /// Returns the open-circuit error (converted into `E`) without invoking
    /// `f` when the breaker refuses the call; otherwise returns `f`'s result
    /// unchanged after recording it.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CircuitOpenError>,
    {
        let permit = self.acquire()?;
        let result = f();
        permit.settle(result.is_ok());
        result
    }

    /// Guard an asynchronous call. Same semantics as [`CircuitBreaker::call`].
    ///
    /// The future is not polled when the breaker refuses the call. Dropping
    /// the returned future mid-flight (e.g. an outer timeout) counts as a
    /// failure.
    pub async fn call_async<T, E, Fut>(&self, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let permit = self.acquire()?;
        let result = fut.await;
        permit.settle(result.is_ok());
        result
    }

    /// Admission check shared by both entry points.
    fn acquire(&self) -> Result<Permit<'_>, CircuitOpenError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false)),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_time
                    .is_none_or(|t| t.elapsed() >= self.recovery_timeout);
                if cooled_down {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Ok(Permit::new(self, true))
                } else {
                    debug!(breaker = %self.name, "Circuit open, rejecting call");
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    debug!(breaker = %self.name, "Probe already in flight, rejecting call");
                    Err(self.open_error())
                } else {
                    inner.probe_in_flight = true;
                    Ok(Permit::new(self, true))
                }
            }
        }
    }

    /// Outcome bookkeeping shared by both entry points.
    fn record(&self, probe: bool, success: bool) {
        let mut inner = self.lock();
        if probe {
            inner.probe_in_flight = false;
        }

        if success {
            match inner.state {
                CircuitState::Closed => inner.failure_count = 0,
                CircuitState::HalfOpen if probe => {
                    inner.failure_count = 0;
                    self.transition(&mut inner, CircuitState::Closed);
                }
                // A call admitted before the circuit tripped says nothing
                // about recovery.
                _ => {}
            }
            return;
        }

        inner.failure_count = inner.failure_count.saturating_add(1);
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.failure_threshold {
                    inner.last_failure_time = Some(Instant::now());
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if probe => {
                inner.last_failure_time = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        if to == CircuitState::Open {
            warn!(
                breaker = %self.name,
                from = ?from,
                to = ?to,
                failure_count = inner.failure_count,
                "Circuit breaker state changed"
            );
        } else {
            info!(
                breaker = %self.name,
                from = ?from,
                to = ?to,
                failure_count = inner.failure_count,
                "Circuit breaker state changed"
            );
        }
    }

    fn open_error(&self) -> CircuitOpenError {
        CircuitOpenError {
            breaker: self.name.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Admission ticket for one call. Dropped unsettled = failure.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.probe, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(self.probe, false);
        }
    }
}
