//! Scenario 3 from the spec's concrete end-to-end scenarios: a handler
//! that always fails with a retryable error trips the circuit breaker
//! before the retry envelope exhausts its own attempt budget, so the
//! final observed error is `CircuitBreakerOpen` rather than
//! `RetryExhausted`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use commandflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use commandflow_core::{CancelToken, CommandError};
use commandflow_retry::{DelayStrategy, RetryConfig, RetryPolicy};

fn always_retryable_failure(calls: Arc<AtomicU32>) -> impl FnMut(u32) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CommandError>> + Send>> {
    move |_attempt| {
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CommandError::Timeout { layer: "handler" })
        })
    }
}

#[tokio::test]
async fn a_handler_that_always_fails_trips_the_breaker_before_the_retry_budget_is_spent() {
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(2)
            .open_duration(Duration::from_secs(1))
            .build(),
    );
    let policy = RetryPolicy::new(
        RetryConfig::builder()
            .max_attempts(3)
            .delay_strategy(DelayStrategy::Exponential {
                base: Duration::from_millis(10),
                multiplier: 2.0,
                cap: Duration::from_millis(100),
                jitter: 0.0,
            })
            .build(),
    );

    let cancel = CancelToken::none();
    let calls = Arc::new(AtomicU32::new(0));
    let result = policy
        .execute(Some(&breaker), &cancel, always_retryable_failure(Arc::clone(&calls)))
        .await;

    assert!(
        matches!(result, Err(CommandError::CircuitBreakerOpen { .. })),
        "expected CircuitBreakerOpen, got {result:?}"
    );
    assert_eq!(breaker.state(), CircuitState::Open);
    // Attempt 1 and 2 both reach the handler and trip the breaker on the
    // second failure; attempt 3 is rejected by `should_allow` before the
    // handler runs again.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn without_a_circuit_breaker_the_same_handler_exhausts_its_retry_budget() {
    let policy = RetryPolicy::new(
        RetryConfig::builder()
            .max_attempts(3)
            .delay_strategy(DelayStrategy::Immediate)
            .build(),
    );

    let cancel = CancelToken::none();
    let calls = Arc::new(AtomicU32::new(0));
    let result = policy.execute(None, &cancel, always_retryable_failure(Arc::clone(&calls))).await;

    assert!(matches!(result, Err(CommandError::RetryExhausted { attempts: 3, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn a_recovering_handler_succeeds_once_the_breaker_has_cooled_down() {
    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .open_duration(Duration::from_millis(20))
            .build(),
    ));
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let policy = RetryPolicy::standard();
    let cancel = CancelToken::none();
    let result = policy
        .execute(Some(&breaker), &cancel, |_attempt| async { Ok::<_, CommandError>("recovered") })
        .await
        .unwrap();

    assert_eq!(result, "recovered");
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}
