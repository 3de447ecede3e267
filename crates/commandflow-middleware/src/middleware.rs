//! The [`Middleware`] trait and the `next`-exactly-once guard it is handed.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use commandflow_core::{BoxFuture, CancelPoint, CancelToken, CommandError, Context, Priority};

use crate::chain::Chain;

/// An erased command or output value threaded through the chain.
pub type Erased = Box<dyn Any + Send>;

/// One link in a middleware chain.
///
/// Implementors operate on the type-erased command representation so the
/// same middleware instance can be shared across pipelines bound to
/// different concrete command types (see `commandflow-bus`).
pub trait Middleware: Send + Sync + 'static {
    /// A human-readable name, used in diagnostics and introspection.
    fn name(&self) -> &str;

    /// Where this middleware sorts in the chain. Default: [`Priority::Processing`].
    fn priority(&self) -> Priority {
        Priority::Processing
    }

    /// Opts this middleware out of the next-exactly-once guard, permitting
    /// it to call `next` zero, one, or many times (e.g. a layer that
    /// retries the remainder of the chain itself).
    fn is_unsafe(&self) -> bool {
        false
    }

    /// Runs this middleware's logic, calling `next.call(command)` to
    /// continue the chain or returning directly to short-circuit it.
    fn execute<'a>(
        &'a self,
        command: Erased,
        ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>>;

    /// Enables downcasting a `dyn Middleware` back to its concrete type, for
    /// `remove_middleware_by_type`.
    fn as_any(&self) -> &dyn Any {
        self
    }
}

const UNUSED: u8 = 0;
const IN_FLIGHT: u8 = 1;
const USED: u8 = 2;

/// Guards a single middleware invocation's use of its `next` continuation:
/// at most one call may be in flight, and (outside `Unsafe` middleware) at
/// most one call may ever succeed.
pub(crate) struct NextGuard {
    state: AtomicU8,
}

impl NextGuard {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(UNUSED),
        }
    }

    pub(crate) fn was_called(&self) -> bool {
        self.state.load(Ordering::Acquire) != UNUSED
    }
}

/// The continuation handed to a middleware, representing "the rest of the
/// chain" (every middleware after this one, plus the terminal handler).
pub struct Next<'a> {
    pub(crate) chain: &'a Chain,
    pub(crate) idx: usize,
    pub(crate) ctx: &'a Context,
    pub(crate) cancel: &'a CancelToken,
    pub(crate) guard: Arc<NextGuard>,
    pub(crate) unsafe_mode: bool,
}

impl<'a> Next<'a> {
    /// The cancellation token threaded through this execution of the chain,
    /// for middleware that wraps `next` in its own async work (e.g. a retry
    /// loop) and needs to observe cancellation of the surrounding call
    /// rather than fabricate a token that never fires.
    pub fn cancel(&self) -> &'a CancelToken {
        self.cancel
    }

    /// Invokes the remainder of the chain with `command`.
    ///
    /// Calling this a second time fails with
    /// [`CommandError::NextAlreadyCalled`] unless the middleware declared
    /// [`Middleware::is_unsafe`]; calling it again while a prior call is
    /// still executing fails with [`CommandError::NextCurrentlyExecuting`]
    /// regardless.
    pub fn call(&self, command: Erased) -> BoxFuture<'a, Result<Erased, CommandError>> {
        if self.unsafe_mode {
            return self.chain.execute_from(self.idx, command, self.ctx, self.cancel);
        }

        match self
            .guard
            .state
            .compare_exchange(UNUSED, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(IN_FLIGHT) => {
                return Box::pin(async { Err(CommandError::NextCurrentlyExecuting) });
            }
            Err(_) => return Box::pin(async { Err(CommandError::NextAlreadyCalled) }),
        }

        let guard = Arc::clone(&self.guard);
        let fut = self.chain.execute_from(self.idx, command, self.ctx, self.cancel);
        Box::pin(async move {
            let result = fut.await;
            guard.state.store(USED, Ordering::Release);
            result
        })
    }
}

/// Used internally by [`Chain`] to check `cancel` at a cancellation
/// checkpoint and translate it to the right [`CancelPoint`].
pub(crate) fn check_cancel(cancel: &CancelToken, at: CancelPoint) -> Result<(), CommandError> {
    if cancel.is_cancelled() {
        Err(CommandError::Cancelled { at })
    } else {
        Ok(())
    }
}
