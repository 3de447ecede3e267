//! The circuit breaker (C2): a three-state FSM gating pipeline executions.
//!
//! `should_allow` decides whether a call may proceed; the caller reports
//! the outcome back via `record_success`/`record_failure`. The breaker has
//! no knowledge of what it's protecting — it's composed into a pipeline's
//! execute path alongside the semaphore (C1) and retry envelope (C3).
//!
//! # Example
//!
//! ```
//! use commandflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .failure_threshold(3)
//!         .open_duration(Duration::from_secs(10))
//!         .build(),
//! );
//!
//! if breaker.should_allow() {
//!     // run the call, then report the outcome
//!     breaker.record_success();
//! }
//! ```

mod circuit;
mod config;
mod events;

pub use circuit::{CircuitBreaker, CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
