//! Scenario 1 (routing, no middleware) and scenario 6 (register replaces)
//! from the spec's concrete end-to-end scenarios, exercised through
//! `commandflow-bus` rather than a single pipeline directly.

use commandflow_bus::CommandBus;
use commandflow_core::{Command, CommandError, Metadata};

struct CreateUser {
    email: String,
}

impl Command for CreateUser {
    type Output = String;
}

#[tokio::test]
async fn routes_to_the_registered_handler_with_no_middleware() {
    let bus = CommandBus::new();
    bus.register::<CreateUser, _>(|cmd: CreateUser| async move { Ok(cmd.email.to_uppercase()) });

    let result = bus
        .send(
            CreateUser {
                email: "a@b".into(),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result, "A@B");
}

#[tokio::test]
async fn dispatch_with_metadata_is_visible_to_the_handler_via_context_free_path() {
    // `send` builds a context from `metadata` even though this handler
    // doesn't look at it; this just pins down that passing metadata
    // doesn't change the routed-to handler or its result.
    let bus = CommandBus::new();
    bus.register::<CreateUser, _>(|cmd: CreateUser| async move { Ok(cmd.email.to_uppercase()) });

    let metadata = Metadata {
        correlation_id: Some("corr-1".into()),
        user_id: Some("u1".into()),
        ..Metadata::default()
    };

    let result = bus
        .send(
            CreateUser {
                email: "x@y".into(),
            },
            Some(metadata),
        )
        .await
        .unwrap();

    assert_eq!(result, "X@Y");
}

#[tokio::test]
async fn dispatch_without_a_handler_fails_with_handler_not_found() {
    struct Unregistered;
    impl Command for Unregistered {
        type Output = ();
    }

    let bus = CommandBus::new();
    let result = bus.send(Unregistered, None).await;
    assert!(matches!(result, Err(CommandError::HandlerNotFound(_))));
}

#[tokio::test]
async fn re_registering_a_command_type_replaces_the_handler() {
    let bus = CommandBus::new();
    bus.register::<CreateUser, _>(|cmd: CreateUser| async move { Ok(format!("v1:{}", cmd.email)) });
    bus.register::<CreateUser, _>(|cmd: CreateUser| async move { Ok(format!("v2:{}", cmd.email)) });

    let result = bus
        .send(
            CreateUser {
                email: "a@b".into(),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result, "v2:a@b");
}
