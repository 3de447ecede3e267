//! Configuration for the circuit breaker.

use crate::events::CircuitBreakerEvent;
use commandflow_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::CircuitBreaker`].
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) open_duration: Duration,
    pub(crate) reset_duration: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// A reasonable default: 5 consecutive failures trip the circuit for
    /// 30 seconds, 2 consecutive half-open successes close it again.
    pub fn standard() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    success_threshold: u32,
    open_duration: Duration,
    reset_duration: Duration,
    name: String,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration: Duration::from_secs(30),
            reset_duration: Duration::from_secs(60),
            name: "circuit-breaker".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Consecutive failures in `Closed` needed to trip the circuit.
    /// Default: 5.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Consecutive successes in `HalfOpen` needed to close the circuit.
    /// Default: 2.
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }

    /// How long the circuit stays `Open` before admitting a probe call.
    /// Default: 30s.
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// How long `Closed` must go without a failure before the failure
    /// streak decays back to zero. Default: 60s.
    pub fn reset_duration(mut self, duration: Duration) -> Self {
        self.reset_duration = duration;
        self
    }

    /// Sets the name of this circuit breaker instance.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked on every state transition.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is rejected because the
    /// circuit is open.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_duration: self.open_duration,
            reset_duration: self.reset_duration,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
