//! Scenario 2 from the spec's concrete end-to-end scenarios: three
//! middlewares at `Validation`, `PreProcessing`, and `PostProcessing`
//! priority must enter in ascending-priority order and exit in the
//! reverse order, regardless of the order they were added in.

use std::sync::{Arc, Mutex};

use commandflow_core::{BoxFuture, CancelToken, CommandError, Context, Priority};
use commandflow_middleware::{ErasedHandler, Erased, Middleware, MiddlewareChain, Next};

struct Logging {
    name: &'static str,
    priority: Priority,
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Logging {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.name.to_string());
            let result = next.call(command).await;
            self.log.lock().unwrap().push(self.name.to_string());
            result
        })
    }
}

fn noop_handler() -> ErasedHandler {
    Arc::new(|cmd: Erased| Box::pin(async move { Ok(cmd) }))
}

#[tokio::test]
async fn middleware_entry_and_exit_follow_priority_order() {
    let log = Arc::new(Mutex::new(Vec::new()));

    // Added out of priority order (C, A, B) to confirm the chain sorts by
    // priority rather than insertion order.
    let c = Arc::new(Logging {
        name: "C",
        priority: Priority::PostProcessing,
        log: Arc::clone(&log),
    });
    let a = Arc::new(Logging {
        name: "A",
        priority: Priority::Validation,
        log: Arc::clone(&log),
    });
    let b = Arc::new(Logging {
        name: "B",
        priority: Priority::PreProcessing,
        log: Arc::clone(&log),
    });

    let mut chain = MiddlewareChain::new(100);
    chain.add(c).unwrap();
    chain.add(a).unwrap();
    chain.add(b).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    chain
        .execute(Box::new(()), &ctx, &cancel, noop_handler())
        .await
        .unwrap();

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, vec!["A", "B", "C", "C", "B", "A"]);
}

#[tokio::test]
async fn ties_within_a_priority_level_preserve_insertion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::new(Logging {
        name: "first",
        priority: Priority::Processing,
        log: Arc::clone(&log),
    });
    let second = Arc::new(Logging {
        name: "second",
        priority: Priority::Processing,
        log: Arc::clone(&log),
    });

    let mut chain = MiddlewareChain::new(100);
    chain.add(first).unwrap();
    chain.add(second).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    chain
        .execute(Box::new(()), &ctx, &cancel, noop_handler())
        .await
        .unwrap();

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, vec!["first", "second", "second", "first"]);
}

#[tokio::test]
async fn a_short_circuiting_middleware_prevents_downstream_entries() {
    struct ShortCircuit;
    impl Middleware for ShortCircuit {
        fn name(&self) -> &str {
            "short-circuit"
        }
        fn priority(&self) -> Priority {
            Priority::Authentication
        }
        fn execute<'a>(
            &'a self,
            _command: Erased,
            _ctx: &'a Context,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Result<Erased, CommandError>> {
            Box::pin(async move { Err(CommandError::Authorization {
                reason: commandflow_core::AuthorizationReason::InvalidCredentials,
            }) })
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let downstream = Arc::new(Logging {
        name: "downstream",
        priority: Priority::Processing,
        log: Arc::clone(&log),
    });

    let mut chain = MiddlewareChain::new(100);
    chain.add(Arc::new(ShortCircuit)).unwrap();
    chain.add(downstream).unwrap();

    let ctx = Context::with_default_metadata();
    let cancel = CancelToken::none();
    let result = chain.execute(Box::new(()), &ctx, &cancel, noop_handler()).await;

    assert!(matches!(result, Err(CommandError::Authorization { .. })));
    assert!(log.lock().unwrap().is_empty(), "downstream middleware must never run");
}
