//! The standard pipeline (C6): binds one command type, one handler, a
//! priority-ordered middleware chain (C5), and the optional back-pressure
//! semaphore (C1) and circuit breaker (C2) that guard its execution.
//!
//! # Example
//!
//! ```
//! use commandflow_core::{Command, CommandError};
//! use commandflow_pipeline::{Pipeline, PipelineOptions};
//!
//! struct Greet(String);
//!
//! impl Command for Greet {
//!     type Output = String;
//! }
//!
//! # async fn example() {
//! let pipeline = Pipeline::with_options(
//!     |cmd: Greet| async move { Ok(format!("hello, {}", cmd.0)) },
//!     PipelineOptions::builder().max_concurrency(4).build(),
//! );
//!
//! let greeting = pipeline.execute(Greet("world".into()), None).await.unwrap();
//! assert_eq!(greeting, "hello, world");
//! # }
//! ```

mod erased;
mod options;
mod pipeline;

pub use erased::ErasedPipeline;
pub use options::{PipelineOptions, PipelineOptionsBuilder};
pub use pipeline::Pipeline;
