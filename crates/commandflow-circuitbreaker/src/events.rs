//! Events emitted by a [`crate::CircuitBreaker`].

use crate::circuit::CircuitState;
use commandflow_core::CommandEvent;
use std::time::Instant;

/// Events emitted as the circuit transitions state or gates a call.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved from one state to another.
    StateTransition {
        /// Name of the circuit breaker instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The state before the transition.
        from: CircuitState,
        /// The state after the transition.
        to: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        /// Name of the circuit breaker instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl CommandEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::CallRejected { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { name, .. } => name,
            CircuitBreakerEvent::CallRejected { name, .. } => name,
        }
    }
}
