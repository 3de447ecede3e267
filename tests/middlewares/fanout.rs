//! Parallel fan-out: `SideEffectsOnly` siblings run against an isolated
//! context fork and must not call `next` themselves, and a single failing
//! sibling fails the whole fan-out without running the continuation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use commandflow_core::{
    BoxFuture, CancelToken, Command, CommandError, Context, ValidationReason,
};
use commandflow_middleware::{Erased, Middleware, Next};
use commandflow_middlewares::{FanoutStrategy, ParallelFanoutMiddleware};

#[derive(Clone)]
struct Checkout {
    amount: u32,
}

impl Command for Checkout {
    type Output = u32;
}

struct WritesToForkedContext(Arc<AtomicU32>);

impl Middleware for WritesToForkedContext {
    fn name(&self) -> &str {
        "writes-to-forked-context"
    }

    fn execute<'a>(&'a self, command: Erased, _ctx: &'a Context, _next: Next<'a>) -> BoxFuture<'a, Result<Erased, CommandError>> {
        let counter = Arc::clone(&self.0);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(command)
        })
    }
}

struct RejectsOverLimit(u32);

impl Middleware for RejectsOverLimit {
    fn name(&self) -> &str {
        "rejects-over-limit"
    }

    fn execute<'a>(&'a self, command: Erased, _ctx: &'a Context, _next: Next<'a>) -> BoxFuture<'a, Result<Erased, CommandError>> {
        let limit = self.0;
        Box::pin(async move {
            let checkout = command.downcast_ref::<Checkout>().expect("Checkout");
            if checkout.amount > limit {
                Err(CommandError::Validation {
                    field: Some("amount".into()),
                    reason: ValidationReason::Custom("exceeds fraud-check limit".into()),
                })
            } else {
                Ok(command)
            }
        })
    }
}

fn terminal_reached_log() -> (commandflow_middleware::ErasedHandler, Arc<Mutex<u32>>) {
    let reached = Arc::new(Mutex::new(0u32));
    let reached2 = Arc::clone(&reached);
    let handler: commandflow_middleware::ErasedHandler = Arc::new(move |cmd| {
        *reached2.lock().unwrap() += 1;
        Box::pin(async move { Ok(cmd) })
    });
    (handler, reached)
}

#[tokio::test]
async fn side_effect_siblings_run_then_the_outer_chain_continues_once() {
    let hits = Arc::new(AtomicU32::new(0));
    let mw = ParallelFanoutMiddleware::new(
        FanoutStrategy::SideEffectsOnly,
        vec![
            Arc::new(WritesToForkedContext(Arc::clone(&hits))),
            Arc::new(WritesToForkedContext(Arc::clone(&hits))),
        ],
    );
    mw.register::<Checkout>();

    let mut chain = commandflow_middleware::MiddlewareChain::new(10);
    chain.add(Arc::new(mw)).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let (handler, reached) = terminal_reached_log();
    let result = chain.execute(Box::new(Checkout { amount: 10 }), &ctx, &cancel, handler).await;

    assert!(result.is_ok());
    assert_eq!(hits.load(Ordering::SeqCst), 2, "both siblings ran");
    assert_eq!(*reached.lock().unwrap(), 1, "the outer chain continued exactly once");
}

#[tokio::test]
async fn a_failing_sibling_fails_the_fan_out_and_the_outer_chain_never_continues() {
    let mw = ParallelFanoutMiddleware::new(FanoutStrategy::PreValidation, vec![Arc::new(RejectsOverLimit(100))]);
    mw.register::<Checkout>();

    let mut chain = commandflow_middleware::MiddlewareChain::new(10);
    chain.add(Arc::new(mw)).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let (handler, reached) = terminal_reached_log();
    let result = chain.execute(Box::new(Checkout { amount: 500 }), &ctx, &cancel, handler).await;

    assert!(matches!(result, Err(CommandError::Validation { .. })));
    assert_eq!(*reached.lock().unwrap(), 0, "the outer chain must not continue past a failed fan-out");
}
