//! Resilience middleware: wraps the remainder of the chain in a bounded
//! retry loop, composing the middleware chain (C5) with the retry envelope
//! (C3) at a layer finer-grained than the whole pipeline.
//!
//! Declares [`Middleware::is_unsafe`] because it may call `next` more than
//! once — the opt-out the chain provides specifically for this case.

use std::sync::Arc;

use commandflow_core::{BoxFuture, Command, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};
use commandflow_retry::RetryPolicy;

use crate::clone_registry::CloneRegistry;

/// Retries the remainder of the chain under a [`RetryPolicy`].
///
/// Retrying means replaying the same command a second time, so any command
/// type that should survive more than one attempt must opt in via
/// [`ResilienceMiddleware::register`] (the same `TypeId`-keyed pattern used
/// by validation and the parallel fan-out middleware). A command that
/// isn't registered still gets its first attempt; a retryable failure on
/// that attempt surfaces as [`CommandError::ExecutionFailed`] instead of a
/// second call to `next`.
pub struct ResilienceMiddleware {
    policy: RetryPolicy,
    registry: CloneRegistry,
}

impl ResilienceMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            registry: CloneRegistry::new(),
        }
    }

    pub fn register<C>(&self)
    where
        C: Command + Clone,
    {
        self.registry.register::<C>();
    }
}

impl Middleware for ResilienceMiddleware {
    fn name(&self) -> &str {
        "resilience"
    }

    fn priority(&self) -> Priority {
        Priority::ErrorHandling
    }

    fn is_unsafe(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let cancel = next.cancel();
            let mut template = Some(command);

            self.policy
                .execute(None, cancel, |_attempt| match template.take() {
                    Some(current) => {
                        template = self.registry.clone_erased(&current);
                        next.call(current)
                    }
                    None => Box::pin(async {
                        Err(CommandError::ExecutionFailed(
                            "resilience middleware has no registered clone for this command \
                             type; cannot retry beyond the first attempt"
                                .into(),
                        ))
                    }) as BoxFuture<'a, Result<Erased, CommandError>>,
                })
                .await
        })
    }
}
