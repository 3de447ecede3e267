//! The [`Command`] and [`Handler`] traits, plus the optional [`Validatable`]
//! capability consumed by the validation middleware.

use crate::error::CommandError;
use std::future::Future;
use std::pin::Pin;

/// An opaque typed input value describing an intended operation.
///
/// Commands are values; they carry no identity of their own. Each command
/// type has an associated `Output` type produced by its one registered
/// handler.
pub trait Command: Send + 'static {
    /// The value produced by a successful handler invocation.
    type Output: Send + 'static;
}

/// A boxed future, used anywhere an async trait method needs to return a
/// `dyn`-compatible future (handlers, middleware `next` continuations).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The single terminal function registered for a command type.
///
/// Exactly one handler is registered per command type in a bus's handler
/// registry; see `commandflow-bus`.
pub trait Handler<C: Command>: Send + Sync {
    /// Executes the command, producing its output or failing.
    fn handle(&self, command: C) -> BoxFuture<'_, Result<C::Output, CommandError>>;
}

/// Blanket impl letting a plain async closure act as a [`Handler`].
impl<C, F, Fut> Handler<C> for F
where
    C: Command,
    F: Fn(C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<C::Output, CommandError>> + Send + 'static,
{
    fn handle(&self, command: C) -> BoxFuture<'_, Result<C::Output, CommandError>> {
        Box::pin((self)(command))
    }
}

/// Optional capability a command can implement to participate in the
/// validation middleware (§4.8). Commands that don't implement this are
/// passed through validation unchanged.
pub trait Validatable {
    /// Validates the command, returning a [`CommandError::Validation`] on
    /// failure.
    fn validate(&self) -> Result<(), CommandError>;
}
