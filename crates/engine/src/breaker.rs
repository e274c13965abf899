//! Circuit breaker around the completion collaborator.
//!
//! After a run of failures the circuit opens and calls are rejected
//! fast instead of piling up latency during a provider outage. One
//! breaker instance is created at process start and shared by
//! reference across engines, so an outage detected by one request
//! protects the others. Circuits are per model, allowing independent
//! recovery.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures before opening the circuit.
    pub failure_threshold: u32,

    /// Time before attempting recovery.
    pub recovery_timeout: Duration,

    /// Successes needed to close the circuit from half-open.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation.
    Closed { failures: u32 },

    /// Circuit is open, calls are rejected fast.
    Open { opened_at: Instant },

    /// Testing whether the circuit can close.
    HalfOpen { successes: u32 },
}

/// Shared failure-tracking state machine. The only cross-request
/// mutable state in the engine.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Check whether the circuit for a model is open.
    ///
    /// Returns true when calls should be rejected without touching the
    /// provider. A circuit past its recovery timeout transitions to
    /// half-open and lets probe calls through.
    pub fn is_open(&self, model: &str) -> bool {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        match states.get(model) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(model);
                    false
                } else {
                    true
                }
            }
            Some(CircuitState::HalfOpen { .. }) => false,
            _ => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, model: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        match states.get(model).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(model.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(model, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        model.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(model.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, model: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        match states.get(model).cloned() {
            Some(CircuitState::Closed { failures }) => {
                if failures + 1 >= self.config.failure_threshold {
                    states.insert(
                        model.to_string(),
                        CircuitState::Open {
                            opened_at: Instant::now(),
                        },
                    );
                    tracing::warn!(
                        model,
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    states.insert(
                        model.to_string(),
                        CircuitState::Closed {
                            failures: failures + 1,
                        },
                    );
                }
            }
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    model.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(model, "Circuit reopened after failed recovery attempt");
            }
            None => {
                // A fresh circuit gets the same threshold check, so a
                // threshold of 1 opens on the very first failure.
                if 1 >= self.config.failure_threshold {
                    states.insert(
                        model.to_string(),
                        CircuitState::Open {
                            opened_at: Instant::now(),
                        },
                    );
                    tracing::warn!(model, failures = 1, "Circuit opened after repeated failures");
                } else {
                    states.insert(model.to_string(), CircuitState::Closed { failures: 1 });
                }
            }
            _ => {}
        }
    }

    fn transition_to_half_open(&self, model: &str) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        if matches!(states.get(model), Some(CircuitState::Open { .. })) {
            states.insert(model.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(model, "Circuit transitioning to half-open for recovery test");
        }
    }

    /// Current state of a model's circuit.
    pub fn state(&self, model: &str) -> CircuitState {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
