//! The retry envelope (C3): bounded attempt loop with pluggable delay
//! strategies, composed directly with the circuit breaker (C2).
//!
//! # Example
//!
//! ```
//! use commandflow_core::{CancelToken, CommandError};
//! use commandflow_retry::{DelayStrategy, RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::new(
//!     RetryConfig::builder()
//!         .max_attempts(3)
//!         .delay_strategy(DelayStrategy::Exponential {
//!             base: Duration::from_millis(10),
//!             multiplier: 2.0,
//!             cap: Duration::from_millis(100),
//!             jitter: 0.1,
//!         })
//!         .build(),
//! );
//!
//! let cancel = CancelToken::none();
//! let result = policy
//!     .execute(None, &cancel, |_attempt| async { Ok::<_, CommandError>(()) })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod delay;
mod events;
mod retry;

pub use config::{RetryConfig, RetryConfigBuilder, RetryPredicate};
pub use delay::DelayStrategy;
pub use events::RetryEvent;
pub use retry::RetryPolicy;
