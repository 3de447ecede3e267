//! The next-exactly-once guard (spec §4.5): a second call to `next` fails
//! with `NextAlreadyCalled`, a concurrent call fails with
//! `NextCurrentlyExecuting`, and a middleware declaring `is_unsafe` may
//! call `next` more than once.

use std::sync::Arc;

use commandflow_core::{BoxFuture, CancelToken, CommandError, Context, Priority};
use commandflow_middleware::{Erased, ErasedHandler, Middleware, MiddlewareChain, Next};

fn counting_handler(hits: Arc<std::sync::atomic::AtomicUsize>) -> ErasedHandler {
    Arc::new(move |cmd: Erased| {
        let hits = Arc::clone(&hits);
        Box::pin(async move {
            hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(cmd)
        })
    })
}

struct CallsNextTwice;
impl Middleware for CallsNextTwice {
    fn name(&self) -> &str {
        "calls-next-twice"
    }
    fn priority(&self) -> Priority {
        Priority::Processing
    }
    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let first = next.call(command).await;
            // Whatever the first call produced, we can't reuse its
            // `Erased` (it's moved out by `.call`), so pass a fresh value
            // to observe the guard's rejection.
            let second = next.call(Box::new(())).await;
            assert!(matches!(second, Err(CommandError::NextAlreadyCalled)));
            first
        })
    }
}

#[tokio::test]
async fn second_call_to_next_fails_with_next_already_called() {
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut chain = MiddlewareChain::new(100);
    chain.add(Arc::new(CallsNextTwice)).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let result = chain
        .execute(Box::new(()), &ctx, &cancel, counting_handler(Arc::clone(&hits)))
        .await;

    assert!(result.is_ok());
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1, "handler runs exactly once");
}

struct UnsafeRetrier {
    attempts: usize,
}
impl Middleware for UnsafeRetrier {
    fn name(&self) -> &str {
        "unsafe-retrier"
    }
    fn priority(&self) -> Priority {
        Priority::Processing
    }
    fn is_unsafe(&self) -> bool {
        true
    }
    fn execute<'a>(
        &'a self,
        _command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let mut last = Err(CommandError::ExecutionFailed("never ran".into()));
            for _ in 0..self.attempts {
                last = next.call(Box::new(())).await;
                if last.is_ok() {
                    break;
                }
            }
            last
        })
    }
}

struct CallsNextConcurrently;
impl Middleware for CallsNextConcurrently {
    fn name(&self) -> &str {
        "calls-next-concurrently"
    }
    fn priority(&self) -> Priority {
        Priority::Processing
    }
    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let fut_a = next.call(command);
            let fut_b = next.call(Box::new(()));
            let (a, b) = tokio::join!(fut_a, fut_b);
            assert!(a.is_ok() || b.is_ok(), "exactly one concurrent call should win");
            assert!(matches!(a, Err(CommandError::NextCurrentlyExecuting)) || matches!(b, Err(CommandError::NextCurrentlyExecuting)));
            if a.is_ok() {
                a
            } else {
                b
            }
        })
    }
}

#[tokio::test]
async fn a_concurrent_second_call_to_next_fails_with_next_currently_executing() {
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut chain = MiddlewareChain::new(100);
    chain.add(Arc::new(CallsNextConcurrently)).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let result = chain
        .execute(Box::new(()), &ctx, &cancel, counting_handler(Arc::clone(&hits)))
        .await;

    assert!(result.is_ok());
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1, "only the winning call reaches the handler");
}

#[tokio::test]
async fn an_unsafe_middleware_may_call_next_more_than_once() {
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut chain = MiddlewareChain::new(100);
    chain.add(Arc::new(UnsafeRetrier { attempts: 3 })).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let result = chain
        .execute(Box::new(()), &ctx, &cancel, counting_handler(Arc::clone(&hits)))
        .await;

    assert!(result.is_ok());
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 3, "handler ran once per next() call");
}
