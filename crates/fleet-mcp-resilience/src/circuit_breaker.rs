//! Count-based sliding-window circuit breaker.
//!
//! CLOSED → OPEN when the failure rate over the window reaches the
//! threshold and at least `minimum_calls` outcomes were observed;
//! OPEN → HALF_OPEN once the open wait elapses; HALF_OPEN → CLOSED after
//! every probe succeeds, back to OPEN on any probe failure.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use fleet_mcp_core::error::{FleetError, FleetResult};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure rate, in percent, at which the circuit opens
    pub failure_rate_threshold: f64,
    /// Number of most recent calls considered
    pub sliding_window_size: usize,
    /// Calls required in the window before the rate is evaluated
    pub minimum_calls: usize,
    /// How long the circuit stays open before probing
    pub open_wait: Duration,
    /// Probe calls admitted in half-open state
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_calls: 5,
            open_wait: Duration::from_secs(30),
            half_open_probes: 3,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Most recent outcomes, `true` = failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_remaining: u32,
    probes_succeeded: u32,
}

impl Inner {
    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|failed| **failed).count();
        failures as f64 * 100.0 / self.window.len() as f64
    }

    fn record(&mut self, failed: bool, config: &CircuitBreakerConfig) {
        self.window.push_back(failed);
        while self.window.len() > config.sliding_window_size {
            self.window.pop_front();
        }
    }
}

/// Sliding-window failure-rate gate for one logical endpoint.
pub struct CircuitBreaker {
    endpoint: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probes_remaining: 0,
                probes_succeeded: 0,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the breaker to admit a call.
    pub async fn try_acquire(&self) -> FleetResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let waited = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_wait)
                    .unwrap_or(true);
                if !waited {
                    return Err(FleetError::CircuitOpen(self.endpoint.clone()));
                }
                info!(endpoint = %self.endpoint, "circuit half-open, probing");
                inner.state = CircuitState::HalfOpen;
                inner.probes_remaining = self.config.half_open_probes;
                inner.probes_succeeded = 0;
                inner.window.clear();
                inner.probes_remaining -= 1;
                Ok(())
            }
            CircuitState::HalfOpen => {
                if inner.probes_remaining == 0 {
                    return Err(FleetError::CircuitOpen(self.endpoint.clone()));
                }
                inner.probes_remaining -= 1;
                Ok(())
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => inner.record(false, &self.config),
            CircuitState::HalfOpen => {
                inner.probes_succeeded += 1;
                if inner.probes_succeeded >= self.config.half_open_probes {
                    info!(endpoint = %self.endpoint, "circuit closed after successful probes");
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.window.clear();
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.record(true, &self.config);
                // The rate only counts once the minimum-calls floor is met.
                if inner.window.len() >= self.config.minimum_calls
                    && inner.failure_rate() >= self.config.failure_rate_threshold
                {
                    warn!(
                        endpoint = %self.endpoint,
                        failure_rate = inner.failure_rate(),
                        "circuit opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.window.clear();
                }
            }
            CircuitState::HalfOpen => {
                warn!(endpoint = %self.endpoint, "probe failed, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn recorded_calls(&self) -> usize {
        self.inner.lock().await.window.len()
    }

    pub async fn failure_rate(&self) -> f64 {
        self.inner.lock().await.failure_rate()
    }
}
