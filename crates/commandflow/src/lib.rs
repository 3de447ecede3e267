//! `commandflow` — a command dispatch and middleware pipeline runtime.
//!
//! Typed commands flow through an ordered chain of middleware before
//! reaching the single handler registered for their command type. The
//! [`bus`] is the front door; it routes by command-type identity to a
//! [`pipeline`], which composes the middleware list via the [`middleware`]
//! chain engine and optionally wraps execution in a [`semaphore`]-backed
//! bulkhead, a [`circuitbreaker`], and a [`retry`] envelope. [`middlewares`]
//! supplies the cross-cutting layers (validation, authorization, rate
//! limiting, resilience, parallel fan-out, audit logging, encryption) that
//! plug into that chain.
//!
//! # Quick start
//!
//! ```
//! use commandflow::prelude::*;
//!
//! struct CreateUser {
//!     email: String,
//! }
//!
//! impl Command for CreateUser {
//!     type Output = String;
//! }
//!
//! # async fn example() {
//! let bus = CommandBus::new();
//! bus.register::<CreateUser, _>(|cmd: CreateUser| async move {
//!     Ok(cmd.email.to_uppercase())
//! });
//!
//! let greeting = bus.send(CreateUser { email: "a@b".into() }, None).await.unwrap();
//! assert_eq!(greeting, "A@B");
//! # }
//! ```
//!
//! Each component is also usable standalone — see the crate-level docs of
//! [`commandflow_core`], [`commandflow_semaphore`], [`commandflow_circuitbreaker`],
//! [`commandflow_retry`], [`commandflow_middleware`], [`commandflow_pipeline`],
//! [`commandflow_bus`], and [`commandflow_middlewares`] for the pieces this
//! crate re-exports.

pub use commandflow_bus as bus;
pub use commandflow_circuitbreaker as circuitbreaker;
pub use commandflow_core as core;
pub use commandflow_middleware as middleware;
pub use commandflow_middlewares as middlewares;
pub use commandflow_pipeline as pipeline;
pub use commandflow_retry as retry;
pub use commandflow_semaphore as semaphore;

/// The commonly-needed types for building a bus, registering handlers, and
/// attaching cross-cutting middleware, gathered in one `use` line.
pub mod prelude {
    pub use commandflow_bus::CommandBus;
    pub use commandflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use commandflow_core::{
        CancelToken, Command, CommandError, Context, Handler, Metadata, Priority, Validatable,
    };
    pub use commandflow_middleware::{Erased, Middleware, MiddlewareChain, Next};
    pub use commandflow_middlewares::{
        AuditLoggingMiddleware, AuthorizationMiddleware, EncryptionMiddleware,
        ParallelFanoutMiddleware, RateLimitingMiddleware, ResilienceMiddleware,
        SecurityPolicyMiddleware, ValidationMiddleware,
    };
    pub use commandflow_pipeline::{Pipeline, PipelineOptions};
    pub use commandflow_retry::{DelayStrategy, RetryConfig, RetryPolicy};
    pub use commandflow_semaphore::{BackPressureStrategy, Semaphore, SemaphoreConfig};
}
