//! Generation service health tracking.
//!
//! A circuit breaker over consecutive generation failures. Once the
//! failure threshold is reached the service is flagged as degraded: the
//! gate stops calling it and running conversations wind down. After the
//! pause elapses one probe call is allowed through.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use parley_types::config::HealthConfig;
use parley_types::error::GenerationError;
use serde::Serialize;

/// Circuit breaker state for the generation service.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward the threshold.
    Closed { consecutive_failures: u32 },
    /// Degraded. No calls until `wait_duration` has elapsed.
    Open {
        opened_at: Instant,
        wait_duration: Duration,
    },
    /// One probe call allowed to test whether the service recovered.
    HalfOpen,
}

/// Health record for the single shared generation service.
#[derive(Debug)]
pub struct ServiceHealth {
    pub state: CircuitState,
    pub last_error: Option<String>,
    pub last_success: Option<Instant>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Pause before a probe is allowed.
    pub open_duration: Duration,
}

impl ServiceHealth {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            last_error: None,
            last_success: None,
            last_latency_ms: None,
            total_calls: 0,
            total_failures: 0,
            failure_threshold: config.failure_threshold,
            open_duration: Duration::from_secs(config.pause_secs),
        }
    }

    /// Whether a call may be made now. Moves Open -> HalfOpen once the
    /// pause has elapsed.
    pub fn is_available(&mut self) -> bool {
        match &self.state {
            CircuitState::Closed { .. } | CircuitState::HalfOpen => true,
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => {
                if opened_at.elapsed() >= *wait_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether the service is inside its pause window. Does not transition.
    pub fn is_degraded(&self) -> bool {
        match &self.state {
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => opened_at.elapsed() < *wait_duration,
            _ => false,
        }
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.total_calls += 1;
        self.last_success = Some(Instant::now());
        self.last_latency_ms = Some(latency.as_millis() as u64);
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
        };
    }

    pub fn record_failure(&mut self, error: &GenerationError) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());

        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let new_count = consecutive_failures + 1;
                if new_count >= self.failure_threshold {
                    self.open();
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: new_count,
                    };
                }
            }
            // Probe failed.
            CircuitState::HalfOpen => self.open(),
            CircuitState::Open { .. } => {}
        }
    }

    /// Force the degraded state, e.g. from an external health probe.
    pub fn force_open(&mut self, wait_duration: Duration) {
        self.state = CircuitState::Open {
            opened_at: Instant::now(),
            wait_duration,
        };
    }

    fn open(&mut self) {
        self.state = CircuitState::Open {
            opened_at: Instant::now(),
            wait_duration: self.open_duration,
        };
    }

    pub fn to_status(&self) -> HealthStatus {
        let (circuit_state, consecutive_failures) = match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => ("closed", *consecutive_failures),
            CircuitState::Open { .. } => ("open", self.failure_threshold),
            CircuitState::HalfOpen => ("half_open", 0),
        };
        HealthStatus {
            circuit_state: circuit_state.to_string(),
            consecutive_failures,
            degraded: self.is_degraded(),
            last_error: self.last_error.clone(),
            last_latency_ms: self.last_latency_ms,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
        }
    }
}

/// Serializable snapshot of service health for CLI display.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub circuit_state: String,
    pub consecutive_failures: u32,
    pub degraded: bool,
    pub last_error: Option<String>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
}

/// Shared, thread-safe handle over [`ServiceHealth`].
///
/// The turn loop reads the degraded flag before every call; the gate
/// records results after every call.
#[derive(Debug)]
pub struct HealthMonitor {
    inner: Mutex<ServiceHealth>,
}

impl HealthMonitor {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            inner: Mutex::new(ServiceHealth::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceHealth> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_degraded(&self) -> bool {
        self.lock().is_degraded()
    }

    pub fn try_acquire(&self) -> bool {
        self.lock().is_available()
    }

    pub fn record_success(&self, latency: Duration) {
        self.lock().record_success(latency);
    }

    pub fn record_failure(&self, error: &GenerationError) {
        self.lock().record_failure(error);
    }

    pub fn mark_degraded(&self, wait_duration: Duration) {
        self.lock().force_open(wait_duration);
    }

    pub fn status(&self) -> HealthStatus {
        self.lock().to_status()
    }
}
