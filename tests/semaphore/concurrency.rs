//! Scenario 4 from the spec's concrete end-to-end scenarios: five
//! 50ms-sleeping commands through a `Suspend`-strategy semaphore bounded
//! at `max_concurrency = 2` all complete, taking roughly
//! `ceil(5 / 2) * 50ms = 150ms` wall-clock, never admitting more than
//! `max_concurrency` at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use commandflow_core::{CancelToken, Priority};
use commandflow_semaphore::{BackPressureStrategy, Semaphore, SemaphoreConfig};

#[tokio::test]
async fn five_commands_through_a_two_slot_semaphore_complete_in_three_batches() {
    let sem = Semaphore::new(
        SemaphoreConfig::builder()
            .max_concurrency(2)
            .max_outstanding(4)
            .strategy(BackPressureStrategy::Suspend)
            .build(),
    );

    let active_now = Arc::new(AtomicUsize::new(0));
    let peak_active = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..5 {
        let sem = sem.clone();
        let active_now = Arc::clone(&active_now);
        let peak_active = Arc::clone(&peak_active);
        handles.push(tokio::spawn(async move {
            let cancel = CancelToken::new();
            let permit = sem.acquire(Priority::Processing, 0, &cancel).await.unwrap();
            let now = active_now.fetch_add(1, Ordering::SeqCst) + 1;
            peak_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            active_now.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    let elapsed = start.elapsed();

    assert!(peak_active.load(Ordering::SeqCst) <= 2, "never more than max_concurrency admitted at once");
    assert!(
        elapsed >= Duration::from_millis(130) && elapsed <= Duration::from_millis(300),
        "expected roughly 150ms for 5 commands over 2 slots, got {elapsed:?}"
    );
}

#[tokio::test]
async fn suspend_strategy_admits_beyond_max_outstanding_up_to_its_hard_ceiling() {
    // Suspend queues past `max_outstanding` up to `2 * max_outstanding`
    // before rejecting; with max_concurrency = 1 and max_outstanding = 2,
    // a 5th concurrent arrival (1 active + 3 queued already) should still
    // be admitted into the queue rather than rejected.
    let sem = Semaphore::new(
        SemaphoreConfig::builder()
            .max_concurrency(1)
            .max_outstanding(2)
            .strategy(BackPressureStrategy::Suspend)
            .build(),
    );

    let holder_cancel = CancelToken::new();
    let _holder = sem.acquire(Priority::Processing, 0, &holder_cancel).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let sem = sem.clone();
        handles.push(tokio::spawn(async move {
            let cancel = CancelToken::new();
            sem.acquire(Priority::Processing, 0, &cancel).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sem.queued(), 3);

    drop(_holder);
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
