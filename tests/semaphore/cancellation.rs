//! Cancelling a command while it is queued for a permit removes its
//! waiter without consuming a permit, and never grants it one later.

use std::time::Duration;

use commandflow_core::{CancelToken, CommandError, Priority};
use commandflow_semaphore::{Semaphore, SemaphoreConfig};

#[tokio::test]
async fn cancelling_a_queued_acquire_frees_the_waiter_slot_for_others() {
    let sem = Semaphore::new(SemaphoreConfig::builder().max_concurrency(1).build());
    let holder_cancel = CancelToken::new();
    let holder = sem.acquire(Priority::Processing, 0, &holder_cancel).await.unwrap();

    let cancelled_waiter = CancelToken::new();
    let sem2 = sem.clone();
    let cancelled_waiter2 = cancelled_waiter.clone();
    let cancelled_handle =
        tokio::spawn(async move { sem2.acquire(Priority::Processing, 0, &cancelled_waiter2).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sem.queued(), 1);
    cancelled_waiter.cancel();

    let result = tokio::time::timeout(Duration::from_millis(200), cancelled_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(CommandError::Cancelled { .. })));
    assert_eq!(sem.queued(), 0, "the cancelled waiter is removed from the queue");

    // The freed queue slot (and eventually the permit) is still usable by
    // a fresh acquire.
    let patient_cancel = CancelToken::new();
    let sem3 = sem.clone();
    let patient_handle =
        tokio::spawn(async move { sem3.acquire(Priority::Processing, 0, &patient_cancel).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(holder);

    let patient = tokio::time::timeout(Duration::from_millis(200), patient_handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(sem.active(), 1);
    drop(patient);
}

#[tokio::test]
async fn a_cancel_token_cancelled_before_acquire_is_called_fails_immediately() {
    let sem = Semaphore::new(SemaphoreConfig::builder().max_concurrency(1).build());
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = sem.acquire(Priority::Processing, 0, &cancel).await;
    assert!(matches!(result, Err(CommandError::Cancelled { .. })));
    assert_eq!(sem.active(), 0, "no permit was consumed");
}
