//! The circuit breaker FSM (C2): `Closed` → `Open` → `HalfOpen` → `Closed`,
//! gating pipeline executions with no knowledge of what they are.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::gauge;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

/// The circuit's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls are admitted.
    Closed,
    /// Tripped; calls are rejected until `open_duration` elapses.
    Open,
    /// Probing; a limited stream of calls is admitted to test recovery.
    HalfOpen,
}

/// A point-in-time snapshot of a circuit breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded in `Closed` (reset on success or
    /// decay).
    pub failures: u32,
    /// Consecutive successes recorded in `HalfOpen`.
    pub successes: u32,
}

struct Counters {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_until: Option<Instant>,
    last_failure_at: Option<Instant>,
}

/// A three-state circuit breaker.
///
/// `should_allow` is the gating query; it has no side effects beyond the
/// `Open → HalfOpen` promotion once `open_duration` has elapsed. Callers
/// report the outcome of an admitted call via exactly one of
/// `record_success`/`record_failure`.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    counters: Mutex<Counters>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker, starting `Closed`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(Counters {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_until: None,
                last_failure_at: None,
            }),
        }
    }

    /// The gating query. Returns `true` if a call may proceed.
    ///
    /// In `Open`, if `open_duration` has elapsed since the trip, this
    /// promotes the circuit to `HalfOpen` and admits the caller as the
    /// first probe; concurrent callers may all observe this promotion and
    /// all be admitted as probes, which is by design (§4.2).
    pub fn should_allow(&self) -> bool {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match counters.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let until = counters.opened_until.unwrap_or_else(Instant::now);
                if Instant::now() < until {
                    drop(counters);
                    self.emit_rejected();
                    false
                } else {
                    self.transition(&mut counters, CircuitState::HalfOpen);
                    counters.successes = 0;
                    true
                }
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match counters.state {
            CircuitState::Closed => {
                counters.failures = 0;
            }
            CircuitState::HalfOpen => {
                counters.successes += 1;
                if counters.successes >= self.config.success_threshold {
                    self.transition(&mut counters, CircuitState::Closed);
                    counters.failures = 0;
                    counters.successes = 0;
                }
            }
            CircuitState::Open => {
                // A late success racing a not-yet-observed Open→HalfOpen
                // promotion; harmless to ignore.
            }
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match counters.state {
            CircuitState::Closed => {
                if let Some(last) = counters.last_failure_at {
                    if now.duration_since(last) >= self.config.reset_duration {
                        counters.failures = 0;
                    }
                }
                counters.failures += 1;
                counters.last_failure_at = Some(now);
                if counters.failures >= self.config.failure_threshold {
                    self.trip(&mut counters, now);
                }
            }
            CircuitState::HalfOpen => {
                self.trip(&mut counters, now);
                counters.successes = 0;
            }
            CircuitState::Open => {
                // Already open; nothing to do.
            }
        }
    }

    /// The current state.
    pub fn state(&self) -> CircuitState {
        self.counters.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// The name this circuit breaker was configured with, for attaching to
    /// errors raised when a call is rejected.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// A snapshot of the current counters.
    pub fn metrics(&self) -> CircuitMetrics {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        CircuitMetrics {
            state: counters.state,
            failures: counters.failures,
            successes: counters.successes,
        }
    }

    fn trip(&self, counters: &mut Counters, now: Instant) {
        counters.opened_until = Some(now + self.config.open_duration);
        self.transition(counters, CircuitState::Open);
        counters.failures = 0;
    }

    fn transition(&self, counters: &mut Counters, to: CircuitState) {
        let from = counters.state;
        if from == to {
            return;
        }
        counters.state = to;
        #[cfg(feature = "metrics")]
        gauge!("commandflow_circuit_breaker_state", "name" => self.config.name.clone())
            .set(state_gauge_value(to));
        self.config.event_listeners.emit(&CircuitBreakerEvent::StateTransition {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }

    fn emit_rejected(&self) {
        self.config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
        });
    }
}

#[cfg(feature = "metrics")]
fn state_gauge_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}
