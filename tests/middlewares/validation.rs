//! Scenario 6 from the spec's concrete end-to-end scenarios: a
//! `Validatable` command with a missing required field is rejected before
//! its handler ever runs, routed through a full `CommandBus` rather than a
//! bare middleware chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use commandflow_bus::CommandBus;
use commandflow_core::{Command, CommandError, Validatable, ValidationReason};
use commandflow_middlewares::ValidationMiddleware;

struct CreateUser {
    email: String,
}

impl Command for CreateUser {
    type Output = String;
}

impl Validatable for CreateUser {
    fn validate(&self) -> Result<(), CommandError> {
        if self.email.is_empty() {
            Err(CommandError::Validation {
                field: Some("email".into()),
                reason: ValidationReason::MissingRequired,
            })
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn a_command_failing_validation_never_reaches_its_handler() {
    let validation = Arc::new(ValidationMiddleware::new());
    validation.register::<CreateUser>();

    let bus = CommandBus::new();
    bus.add_middleware(validation).unwrap();

    let handler_hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&handler_hits);
    bus.register::<CreateUser, _>(move |cmd: CreateUser| {
        let hits = Arc::clone(&hits_clone);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(cmd.email)
        }
    });

    let result = bus
        .send(
            CreateUser {
                email: String::new(),
            },
            None,
        )
        .await;

    assert!(matches!(
        result,
        Err(CommandError::Validation {
            field: Some(ref f),
            reason: ValidationReason::MissingRequired,
        }) if f == "email"
    ));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0, "handler must not run for an invalid command");
}

#[tokio::test]
async fn a_valid_command_reaches_its_handler() {
    let validation = Arc::new(ValidationMiddleware::new());
    validation.register::<CreateUser>();

    let bus = CommandBus::new();
    bus.add_middleware(validation).unwrap();
    bus.register::<CreateUser, _>(|cmd: CreateUser| async move { Ok(cmd.email) });

    let result = bus
        .send(
            CreateUser {
                email: "a@b".into(),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result, "a@b");
}
