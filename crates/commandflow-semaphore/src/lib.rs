//! The back-pressure semaphore (C1).
//!
//! Bounds how many command executions run concurrently through a pipeline,
//! queueing excess arrivals by priority and applying one of four
//! back-pressure strategies once the queue itself is full.
//!
//! # Example
//!
//! ```
//! use commandflow_core::{CancelToken, Priority};
//! use commandflow_semaphore::{BackPressureStrategy, Semaphore, SemaphoreConfig};
//!
//! # async fn example() {
//! let semaphore = Semaphore::new(
//!     SemaphoreConfig::builder()
//!         .max_concurrency(10)
//!         .strategy(BackPressureStrategy::Suspend)
//!         .build(),
//! );
//!
//! let cancel = CancelToken::none();
//! let permit = semaphore.acquire(Priority::Processing, 0, &cancel).await.unwrap();
//! // ... do work while holding `permit` ...
//! drop(permit); // releases automatically; explicit `permit.release()` also works
//! # }
//! ```

mod config;
mod events;
mod semaphore;
mod token;

pub use config::{BackPressureStrategy, SemaphoreConfig, SemaphoreConfigBuilder};
pub use events::SemaphoreEvent;
pub use semaphore::Semaphore;
pub use token::Permit;
