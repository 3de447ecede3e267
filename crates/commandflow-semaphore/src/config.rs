//! Configuration for the back-pressure semaphore.

use crate::events::SemaphoreEvent;
use commandflow_core::{EventListeners, FnListener};
use std::time::Duration;

/// What to do when a new arrival finds the semaphore at its outstanding
/// ceiling (`active + queued == max_outstanding`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackPressureStrategy {
    /// Queue the waiter indefinitely. A secondary hard ceiling at
    /// `2 * max_outstanding` still applies to prevent unbounded growth.
    Suspend,
    /// Fail the oldest queued waiter (regardless of its priority) and admit
    /// the new arrival in its place.
    DropOldest,
    /// Reject the new arrival immediately, leaving the queue untouched.
    DropNewest,
    /// Reject immediately, unless a timeout is given, in which case queue
    /// the waiter but fail it if the timeout elapses first.
    Error(Option<Duration>),
}

/// Configuration for a [`crate::Semaphore`].
#[derive(Clone)]
pub struct SemaphoreConfig {
    pub(crate) max_concurrency: usize,
    pub(crate) max_outstanding: usize,
    pub(crate) max_queue_memory: Option<usize>,
    pub(crate) strategy: BackPressureStrategy,
    pub(crate) waiter_timeout: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<SemaphoreEvent>,
}

impl SemaphoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SemaphoreConfigBuilder {
        SemaphoreConfigBuilder::new()
    }
}

/// Builder for [`SemaphoreConfig`].
pub struct SemaphoreConfigBuilder {
    max_concurrency: usize,
    max_outstanding: Option<usize>,
    max_queue_memory: Option<usize>,
    strategy: BackPressureStrategy,
    waiter_timeout: Duration,
    sweep_interval: Duration,
    name: String,
    event_listeners: EventListeners<SemaphoreEvent>,
}

impl SemaphoreConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrency: 10,
            max_outstanding: None,
            max_queue_memory: None,
            strategy: BackPressureStrategy::Error(None),
            waiter_timeout: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(30),
            name: "semaphore".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the number of permits. Default: 10.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the hard ceiling on `active + queued`. Default:
    /// `max_concurrency * 10`.
    pub fn max_outstanding(mut self, max: usize) -> Self {
        self.max_outstanding = Some(max);
        self
    }

    /// Sets the total estimated-size budget for queued waiters. Unbounded
    /// by default.
    pub fn max_queue_memory(mut self, bytes: usize) -> Self {
        self.max_queue_memory = Some(bytes);
        self
    }

    /// Sets the back-pressure strategy. Default: `Error(None)`.
    pub fn strategy(mut self, strategy: BackPressureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets how long a queued waiter may wait before the sweeper fails it
    /// with `Timeout`. Default: 5 minutes.
    pub fn waiter_timeout(mut self, timeout: Duration) -> Self {
        self.waiter_timeout = timeout;
        self
    }

    /// Sets how often the sweeper task scans the wait queue. Default: 30s.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the name of this semaphore instance (used in events/metrics).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a permit is granted (immediately
    /// or via queueing).
    pub fn on_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SemaphoreEvent::Acquired { active, .. } = event {
                f(*active);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is rejected outright.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SemaphoreEvent::Rejected { reason, .. } = event {
                f(reason);
            }
        }));
        self
    }

    /// Registers a callback invoked when a permit is released.
    pub fn on_released<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let SemaphoreEvent::Released { active, .. } = event {
                f(*active);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SemaphoreConfig {
        let max_outstanding = self.max_outstanding.unwrap_or(self.max_concurrency * 10);
        SemaphoreConfig {
            max_concurrency: self.max_concurrency,
            max_outstanding,
            max_queue_memory: self.max_queue_memory,
            strategy: self.strategy,
            waiter_timeout: self.waiter_timeout,
            sweep_interval: self.sweep_interval,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for SemaphoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
