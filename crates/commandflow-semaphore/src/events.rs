//! Events emitted by a [`crate::Semaphore`].

use commandflow_core::CommandEvent;
use std::time::{Duration, Instant};

/// Events emitted as waiters are admitted, queued, dropped, or released.
#[derive(Debug, Clone)]
pub enum SemaphoreEvent {
    /// A permit was granted without queueing.
    Acquired {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Number of permits in use immediately after this grant.
        active: usize,
    },
    /// A caller was enqueued to wait for a permit.
    Queued {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Number of waiters in the queue immediately after this enqueue.
        queued: usize,
    },
    /// A queued waiter was granted a permit handed off from a release.
    Admitted {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the waiter spent in the queue.
        wait_time: Duration,
    },
    /// A call was rejected outright (queue full, memory budget exceeded).
    Rejected {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// A queued waiter was dropped to admit a higher-priority arrival.
    Dropped {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the waiter had been queued before being dropped.
        wait_time: Duration,
    },
    /// A queued waiter exceeded `waiter_timeout` and was failed by the sweeper.
    TimedOut {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A permit was released.
    Released {
        /// Name of the semaphore instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Number of permits in use immediately after this release.
        active: usize,
    },
}

impl CommandEvent for SemaphoreEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SemaphoreEvent::Acquired { .. } => "acquired",
            SemaphoreEvent::Queued { .. } => "queued",
            SemaphoreEvent::Admitted { .. } => "admitted",
            SemaphoreEvent::Rejected { .. } => "rejected",
            SemaphoreEvent::Dropped { .. } => "dropped",
            SemaphoreEvent::TimedOut { .. } => "timed_out",
            SemaphoreEvent::Released { .. } => "released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            SemaphoreEvent::Acquired { timestamp, .. }
            | SemaphoreEvent::Queued { timestamp, .. }
            | SemaphoreEvent::Admitted { timestamp, .. }
            | SemaphoreEvent::Rejected { timestamp, .. }
            | SemaphoreEvent::Dropped { timestamp, .. }
            | SemaphoreEvent::TimedOut { timestamp, .. }
            | SemaphoreEvent::Released { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            SemaphoreEvent::Acquired { name, .. }
            | SemaphoreEvent::Queued { name, .. }
            | SemaphoreEvent::Admitted { name, .. }
            | SemaphoreEvent::Rejected { name, .. }
            | SemaphoreEvent::Dropped { name, .. }
            | SemaphoreEvent::TimedOut { name, .. }
            | SemaphoreEvent::Released { name, .. } => name,
        }
    }
}
