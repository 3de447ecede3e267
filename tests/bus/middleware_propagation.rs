//! Middleware added to a bus applies to every registered pipeline, both
//! ones registered before and after the middleware was added, and the
//! bus enforces its own `max_depth` on the shared master list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use commandflow_bus::CommandBus;
use commandflow_core::{BoxFuture, Command, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

struct Counted(Arc<AtomicUsize>);

impl Middleware for Counted {
    fn name(&self) -> &str {
        "counted"
    }

    fn priority(&self) -> Priority {
        Priority::Monitoring
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { next.call(command).await })
    }
}

struct Ping;
impl Command for Ping {
    type Output = ();
}

struct Pong;
impl Command for Pong {
    type Output = ();
}

#[tokio::test]
async fn middleware_added_before_registration_runs_for_new_registrations() {
    let bus = CommandBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    bus.add_middleware(Arc::new(Counted(Arc::clone(&hits)))).unwrap();

    bus.register::<Ping, _>(|_: Ping| async { Ok(()) });
    bus.send(Ping, None).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn middleware_added_after_registration_still_applies() {
    let bus = CommandBus::new();
    bus.register::<Ping, _>(|_: Ping| async { Ok(()) });

    let hits = Arc::new(AtomicUsize::new(0));
    bus.add_middleware(Arc::new(Counted(Arc::clone(&hits)))).unwrap();
    bus.send(Ping, None).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_middleware_instance_runs_for_every_registered_command_type() {
    let bus = CommandBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    bus.add_middleware(Arc::new(Counted(Arc::clone(&hits)))).unwrap();

    bus.register::<Ping, _>(|_: Ping| async { Ok(()) });
    bus.register::<Pong, _>(|_: Pong| async { Ok(()) });

    bus.send(Ping, None).await.unwrap();
    bus.send(Pong, None).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn adding_middleware_beyond_max_depth_fails() {
    let bus = CommandBus::with_max_depth(1);
    bus.add_middleware(Arc::new(Counted(Arc::new(AtomicUsize::new(0)))))
        .unwrap();

    let result = bus.add_middleware(Arc::new(Counted(Arc::new(AtomicUsize::new(0)))));
    assert!(matches!(result, Err(CommandError::MaxDepthExceeded { depth: 2, max: 1 })));
}

#[tokio::test]
async fn clear_middlewares_removes_from_every_registered_pipeline() {
    let bus = CommandBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    bus.add_middleware(Arc::new(Counted(Arc::clone(&hits)))).unwrap();
    bus.register::<Ping, _>(|_: Ping| async { Ok(()) });

    assert_eq!(bus.clear_middlewares(), 1);
    bus.send(Ping, None).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 0, "middleware was cleared, should not run");
    assert_eq!(bus.middleware_count(), 0);
}
