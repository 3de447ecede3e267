//! Scenario 5 from the spec's concrete end-to-end scenarios: a
//! `TokenBucket(capacity = 3, refill_rate = 0)` rate limiter admits
//! exactly 3 of 5 immediate calls from the same identifier, rejecting the
//! rest with `RateLimitExceeded`.

use std::sync::Arc;

use commandflow_core::{CancelToken, Context, Metadata};
use commandflow_middleware::run_isolated;
use commandflow_middlewares::{RateLimitScope, RateLimitStrategy, RateLimitingMiddleware};

fn ctx_for(user_id: &str) -> Context {
    Context::new(
        Metadata {
            user_id: Some(user_id.into()),
            ..Metadata::default()
        },
        "req-rate-limit",
    )
}

fn handler() -> commandflow_middleware::ErasedHandler {
    Arc::new(|cmd| Box::pin(async move { Ok(cmd) }))
}

#[tokio::test]
async fn exactly_capacity_many_calls_are_admitted_per_identifier() {
    let mw = RateLimitingMiddleware::new(
        RateLimitScope::PerUser,
        RateLimitStrategy::TokenBucket {
            capacity: 3,
            refill_rate: 0.0,
        },
    );
    let ctx = ctx_for("u1");
    let cancel = CancelToken::none();

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(run_isolated(&mw, Box::new(()), &ctx, &cancel, handler()).await);
    }

    let admitted = outcomes.iter().filter(|r| r.is_ok()).count();
    let rejected = outcomes.iter().filter(|r| r.is_err()).count();
    assert_eq!(admitted, 3);
    assert_eq!(rejected, 2);
    for outcome in &outcomes[3..] {
        assert!(matches!(outcome, Err(commandflow_core::CommandError::RateLimitExceeded { .. })));
    }
}

#[tokio::test]
async fn a_different_identifier_has_its_own_independent_budget() {
    let mw = RateLimitingMiddleware::new(
        RateLimitScope::PerUser,
        RateLimitStrategy::TokenBucket {
            capacity: 1,
            refill_rate: 0.0,
        },
    );
    let cancel = CancelToken::none();

    let u1 = ctx_for("u1");
    let u2 = ctx_for("u2");

    assert!(run_isolated(&mw, Box::new(()), &u1, &cancel, handler()).await.is_ok());
    assert!(run_isolated(&mw, Box::new(()), &u1, &cancel, handler()).await.is_err());
    assert!(run_isolated(&mw, Box::new(()), &u2, &cancel, handler()).await.is_ok());
}
