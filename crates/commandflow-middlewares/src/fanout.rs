//! Parallel fan-out middleware: runs a set of sibling middlewares
//! concurrently, grounded on the way
//! [`commandflow_core::EventListeners::emit`] fans a single event out to N
//! listeners, generalized here to fan a single command out to N siblings
//! via [`futures::future::join_all`].

use std::sync::Arc;

use commandflow_core::{BoxFuture, CancelToken, Command, CommandError, Context, Priority};
use commandflow_middleware::{run_isolated, Erased, ErasedHandler, Middleware, Next};

use crate::clone_registry::CloneRegistry;

/// Whether siblings see an isolated fork of the context (so their writes
/// can't race with each other or the main chain) or the shared context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanoutStrategy {
    /// Siblings run for their side effects against a forked context;
    /// their return value is discarded once they complete successfully.
    SideEffectsOnly,
    /// Siblings run as read-only pre-checks against the shared context;
    /// any error they return fails the fan-out.
    PreValidation,
}

/// A terminal handed to every sibling: siblings must not call `next`, so
/// reaching this terminal means the sibling violated that contract.
fn forbidden_terminal() -> ErasedHandler {
    Arc::new(|_: Erased| {
        Box::pin(async {
            Err(CommandError::ExecutionFailed(
                "a parallel fan-out sibling called next(); siblings must not continue the chain"
                    .into(),
            ))
        })
    })
}

/// Runs `siblings` concurrently against clones of the command, then
/// continues the outer chain once with the original, iff every sibling
/// succeeded.
///
/// Commands fanned out to siblings must be registered with
/// [`ParallelFanoutMiddleware::register`] (the same clone-registry pattern
/// [`crate::resilience::ResilienceMiddleware`] uses) since an `Erased`
/// command can't be duplicated generically.
pub struct ParallelFanoutMiddleware {
    strategy: FanoutStrategy,
    siblings: Vec<Arc<dyn Middleware>>,
    registry: CloneRegistry,
}

impl ParallelFanoutMiddleware {
    pub fn new(strategy: FanoutStrategy, siblings: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            strategy,
            siblings,
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

impl Middleware for ParallelFanoutMiddleware {
    fn name(&self) -> &str {
        "parallel-fanout"
    }

    fn priority(&self) -> Priority {
        Priority::PreProcessing
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            if self.siblings.is_empty() {
                return next.call(command).await;
            }

            let mut sibling_copies = Vec::with_capacity(self.siblings.len());
            for _ in 0..self.siblings.len() {
                let copy = self.registry.clone_erased(&command).ok_or_else(|| {
                    CommandError::ExecutionFailed(
                        "parallel fan-out needs a registered clone for this command type".into(),
                    )
                })?;
                sibling_copies.push(copy);
            }

            let forked_ctx = ctx.fork();
            let sibling_ctx = match self.strategy {
                FanoutStrategy::SideEffectsOnly => &forked_ctx,
                FanoutStrategy::PreValidation => ctx,
            };

            // Error from any sibling cancels the rest: `join_all` itself
            // polls every future to completion, but each sibling's own
            // work should be cheap (a side effect or a read-only check);
            // the result below still short-circuits by returning the
            // first error to the caller without running `next`.
            let runs = self.siblings.iter().zip(sibling_copies).map(|(sibling, copy)| {
                run_isolated(sibling.as_ref(), copy, sibling_ctx, &CancelToken::none(), forbidden_terminal())
            });

            for outcome in futures::future::join_all(runs).await {
                outcome?;
            }

            next.call(command).await
        })
    }
}
