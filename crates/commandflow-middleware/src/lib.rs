//! The middleware chain engine (C5): priority-ordered composition of
//! cross-cutting middleware around a terminal handler.
//!
//! Middleware operate on a type-erased command representation (see
//! [`Erased`]) so the same instance can be installed once on a bus and
//! reused across every command type registered on it.
//!
//! # Example
//!
//! ```
//! use commandflow_core::{CancelToken, CommandError, Context, Priority};
//! use commandflow_middleware::{Erased, Middleware, MiddlewareChain, Next};
//! use std::sync::Arc;
//!
//! struct Logging;
//!
//! impl Middleware for Logging {
//!     fn name(&self) -> &str {
//!         "logging"
//!     }
//!
//!     fn priority(&self) -> Priority {
//!         Priority::Monitoring
//!     }
//!
//!     fn execute<'a>(
//!         &'a self,
//!         command: Erased,
//!         _ctx: &'a Context,
//!         next: Next<'a>,
//!     ) -> commandflow_core::BoxFuture<'a, Result<Erased, CommandError>> {
//!         Box::pin(async move { next.call(command).await })
//!     }
//! }
//!
//! # async fn example() {
//! let mut chain = MiddlewareChain::new(100);
//! chain.add(Arc::new(Logging)).unwrap();
//!
//! let ctx = Context::with_default_metadata();
//! let cancel = CancelToken::none();
//! let handler: commandflow_middleware::ErasedHandler = Arc::new(|cmd: Erased| {
//!     Box::pin(async move { Ok(cmd) })
//! });
//!
//! let result = chain
//!     .execute(Box::new(42i32), &ctx, &cancel, handler)
//!     .await
//!     .unwrap();
//! assert_eq!(*result.downcast::<i32>().unwrap(), 42);
//! # }
//! ```

mod chain;
mod middleware;

pub use chain::{run_isolated, ErasedHandler, MiddlewareChain};
pub use middleware::{Erased, Middleware, Next};
