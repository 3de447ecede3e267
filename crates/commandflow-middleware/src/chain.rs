//! Composition and execution of a priority-ordered middleware chain.

use std::sync::Arc;

use commandflow_core::{BoxFuture, CancelPoint, CancelToken, CommandError, Context};

use crate::middleware::{check_cancel, Erased, Middleware, Next, NextGuard};

/// A boxed, type-erased terminal handler: takes an erased command, returns
/// an erased output.
pub type ErasedHandler = Arc<dyn Fn(Erased) -> BoxFuture<'static, Result<Erased, CommandError>> + Send + Sync>;

/// A mutable, priority-ordered list of middleware, bounded by `max_depth`.
///
/// Middleware are kept sorted by [`Middleware::priority`] (stable: ties
/// keep insertion order) after every mutation, so `execute` always walks
/// them in the order §4.5 specifies without re-sorting per call.
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
    max_depth: usize,
}

impl MiddlewareChain {
    /// Creates an empty chain bounded by `max_depth` middleware.
    pub fn new(max_depth: usize) -> Self {
        Self {
            middlewares: Vec::new(),
            max_depth,
        }
    }

    /// Appends one middleware, failing if it would exceed `max_depth`.
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), CommandError> {
        self.check_capacity(1)?;
        self.middlewares.push(middleware);
        self.resort();
        Ok(())
    }

    /// Appends several middleware atomically: either all are added, or (if
    /// the combined count would exceed `max_depth`) none are.
    pub fn add_all(&mut self, middlewares: Vec<Arc<dyn Middleware>>) -> Result<(), CommandError> {
        self.check_capacity(middlewares.len())?;
        self.middlewares.extend(middlewares);
        self.resort();
        Ok(())
    }

    /// Removes every middleware of concrete type `M`, returning how many
    /// were removed.
    pub fn remove_by_type<M: Middleware>(&mut self) -> usize {
        self.remove_by_type_id(std::any::TypeId::of::<M>())
    }

    /// Removes every middleware whose concrete type matches `id`, returning
    /// how many were removed. Used where the concrete type isn't nameable,
    /// e.g. across an `ErasedPipeline` boundary.
    pub fn remove_by_type_id(&mut self, id: std::any::TypeId) -> usize {
        let before = self.middlewares.len();
        self.middlewares.retain(|m| m.as_any().type_id() != id);
        before - self.middlewares.len()
    }

    /// Removes every middleware, returning the number removed.
    pub fn clear(&mut self) -> usize {
        let n = self.middlewares.len();
        self.middlewares.clear();
        n
    }

    /// Number of middleware currently installed.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if no middleware are installed.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// `true` if a middleware of concrete type `M` is installed.
    pub fn has_middleware<M: Middleware>(&self) -> bool {
        self.middlewares.iter().any(|m| m.as_any().downcast_ref::<M>().is_some())
    }

    /// Names of every installed middleware, in execution order.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    fn check_capacity(&self, additional: usize) -> Result<(), CommandError> {
        let depth = self.middlewares.len() + additional;
        if depth > self.max_depth {
            return Err(CommandError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn resort(&mut self) {
        self.middlewares.sort_by_key(|m| m.priority());
    }

    /// Returns an independent copy of the current middleware list (an
    /// `Arc` clone per link) and `max_depth`. Callers that hold this chain
    /// behind a lock (e.g. a pipeline shared across concurrent executions)
    /// should take a snapshot and drop the lock before executing, so one
    /// in-flight command doesn't serialize every other one behind it.
    pub fn snapshot(&self) -> MiddlewareChain {
        MiddlewareChain {
            middlewares: self.middlewares.clone(),
            max_depth: self.max_depth,
        }
    }

    /// Runs `command` through the chain and into `handler`.
    ///
    /// Checks `cancel` before starting (per §4.5's cancellation point (a));
    /// [`Chain`] checks it again before each middleware and before the
    /// handler.
    pub async fn execute(
        &self,
        command: Erased,
        ctx: &Context,
        cancel: &CancelToken,
        handler: ErasedHandler,
    ) -> Result<Erased, CommandError> {
        check_cancel(cancel, CancelPoint::BeforeStart)?;
        let chain = Chain {
            links: self.middlewares.clone(),
            handler,
        };
        chain.execute_from(0, command, ctx, cancel).await
    }
}

/// An immutable, owned snapshot of a [`MiddlewareChain`] plus its terminal
/// handler, built fresh for each [`MiddlewareChain::execute`] call so the
/// chain may keep mutating between executions without affecting one
/// already in flight.
pub(crate) struct Chain {
    links: Vec<Arc<dyn Middleware>>,
    handler: ErasedHandler,
}

impl Chain {
    pub(crate) fn execute_from<'a>(
        &'a self,
        idx: usize,
        command: Erased,
        ctx: &'a Context,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            if idx == self.links.len() {
                check_cancel(cancel, CancelPoint::BeforeHandler)?;
                return (self.handler)(command).await;
            }

            check_cancel(cancel, CancelPoint::BeforeMiddleware)?;
            let mw = &self.links[idx];
            let guard = Arc::new(NextGuard::new());
            let next = Next {
                chain: self,
                idx: idx + 1,
                ctx,
                cancel,
                guard: Arc::clone(&guard),
                unsafe_mode: mw.is_unsafe(),
            };

            let result = mw.execute(command, ctx, next).await;

            if cfg!(debug_assertions) && !mw.is_unsafe() && !guard.was_called() {
                return Err(CommandError::NextNeverCalled);
            }

            result
        })
    }
}

/// Runs a single middleware to completion outside of any chain, handing it
/// a `next` whose continuation is `terminal` rather than "the rest of some
/// chain". Used to run sibling middleware that aren't themselves part of
/// the installed chain, e.g. the parallel fan-out middleware's branches.
///
/// `next`-exactly-once is still enforced for `mw`, unless it declares
/// [`Middleware::is_unsafe`].
pub async fn run_isolated(
    mw: &dyn Middleware,
    command: Erased,
    ctx: &Context,
    cancel: &CancelToken,
    terminal: ErasedHandler,
) -> Result<Erased, CommandError> {
    let chain = Chain {
        links: Vec::new(),
        handler: terminal,
    };
    let guard = Arc::new(NextGuard::new());
    let next = Next {
        chain: &chain,
        idx: 0,
        ctx,
        cancel,
        guard: Arc::clone(&guard),
        unsafe_mode: mw.is_unsafe(),
    };

    let result = mw.execute(command, ctx, next).await;

    if cfg!(debug_assertions) && !mw.is_unsafe() && !guard.was_called() {
        return Err(CommandError::NextNeverCalled);
    }

    result
}
