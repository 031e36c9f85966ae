//! Circuit breaker for identity provider calls
//!
//! Three states: closed (requests pass), open (requests rejected until the
//! cooldown elapses), half-open (a single probe request decides). Opens
//! after a run of consecutive failures; a failed half-open probe re-opens,
//! a successful one closes and resets.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

/// Why a call was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitRejection {
    /// Circuit is open and the cooldown has not elapsed
    Open,
    /// Half-open probe slot already taken
    ProbeInFlight,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker with a single-probe half-open state
pub struct CircuitBreaker {
    max_failures: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            max_failures,
            reset_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Defaults matching the identity provider policy: open after 5
    /// consecutive failures, stay open for at least 30 seconds.
    pub fn for_identity_provider() -> Self {
        Self::new(5, Duration::from_secs(30))
    }

    /// Ask to admit a call. On `Ok(())` the caller must report the outcome
    /// via `record_success` or `record_failure`.
    pub fn admit(&self) -> Result<(), CircuitRejection> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure
                .map(|t| t.elapsed() > self.reset_timeout)
                .unwrap_or(true);
            if !cooled_down {
                return Err(CircuitRejection::Open);
            }
            inner.state = CircuitState::HalfOpen;
            inner.probe_in_flight = false;
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.probe_in_flight {
                return Err(CircuitRejection::ProbeInFlight);
            }
            inner.probe_in_flight = true;
        }

        Ok(())
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                inner.probe_in_flight = false;
            }
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Report a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                // Probe failed: back to open, pinned at the threshold
                inner.state = CircuitState::Open;
                inner.failures = self.max_failures;
                inner.probe_in_flight = false;
            }
            CircuitState::Closed if inner.failures >= self.max_failures => {
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    /// Execute a closure under circuit protection
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<Result<T, E>, CircuitRejection>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.admit()?;
        let result = f().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        Ok(result)
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(30))
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker();
        for _ in 0..4 {
            cb.admit().unwrap();
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.admit().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.admit(), Err(CircuitRejection::Open));
    }

    #[test]
    fn test_success_resets_failure_run() {
        let cb = breaker();
        for _ in 0..4 {
            cb.admit().unwrap();
            cb.record_failure();
        }
        cb.admit().unwrap();
        cb.record_success();
        // The run is broken; four more failures do not open it
        for _ in 0..4 {
            cb.admit().unwrap();
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_single_probe() {
        let cb = CircuitBreaker::new(1, Duration::ZERO);
        cb.admit().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Cooldown of zero: next admit transitions to half-open
        cb.admit().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Second concurrent probe is rejected
        assert_eq!(cb.admit(), Err(CircuitRejection::ProbeInFlight));

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = CircuitBreaker::new(1, Duration::ZERO);
        cb.admit().unwrap();
        cb.record_failure();

        cb.admit().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_wrapper() {
        let cb = breaker();
        let result: Result<Result<u32, &str>, _> = cb.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap().unwrap(), 7);

        let result: Result<Result<u32, &str>, _> = cb.call(|| async { Err("boom") }).await;
        assert!(result.unwrap().is_err());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
