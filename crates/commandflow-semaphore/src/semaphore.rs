//! The back-pressure semaphore (C1): bounded permits, a priority-ordered
//! wait queue, four back-pressure strategies, a waiter-timeout sweeper, and
//! an RAII token that releases exactly once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use commandflow_core::{BackPressureKind, CancelPoint, CancelToken, CommandError, Priority};
use tokio::sync::oneshot;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use crate::config::{BackPressureStrategy, SemaphoreConfig};
use crate::events::SemaphoreEvent;
use crate::token::Permit;

enum WaitOutcome {
    Granted,
    Dropped(CommandError),
}

struct Waiter {
    id: u64,
    priority: Priority,
    size_estimate: usize,
    enqueued_at: Instant,
    sender: oneshot::Sender<WaitOutcome>,
}

struct State {
    free_permits: usize,
    waiters: VecDeque<Waiter>,
    queued_memory: usize,
    next_id: u64,
    shutdown: bool,
}

pub(crate) struct Inner {
    config: SemaphoreConfig,
    state: Mutex<State>,
}

impl Inner {
    /// Hands the freed permit to the highest-priority waiter, or, if none
    /// are queued, returns it to the free pool. Called from both
    /// `Permit::release`/`drop` and the shutdown path.
    pub(crate) fn do_release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(waiter) = state.waiters.pop_front() {
            state.queued_memory = state.queued_memory.saturating_sub(waiter.size_estimate);
            drop(state);
            let _ = waiter.sender.send(WaitOutcome::Granted);
            self.config.event_listeners.emit(&SemaphoreEvent::Admitted {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                wait_time: waiter.enqueued_at.elapsed(),
            });
        } else {
            state.free_permits += 1;
            let active = self.config.max_concurrency - state.free_permits;
            drop(state);
            self.config.event_listeners.emit(&SemaphoreEvent::Released {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
                active,
            });
        }
    }

    /// Removes a still-queued waiter by id. Returns `false` if the waiter
    /// was no longer in the queue (it has already been popped by
    /// `do_release`, the sweeper, shutdown, or a drop-oldest admission, and
    /// its outcome either already has been or is about to be sent).
    fn remove_waiter(&self, id: u64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
            let waiter = state.waiters.remove(pos).expect("position just found");
            state.queued_memory = state.queued_memory.saturating_sub(waiter.size_estimate);
            true
        } else {
            false
        }
    }

    fn sweep(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.shutdown {
            return;
        }
        let timeout = self.config.waiter_timeout;
        let now = Instant::now();

        let mut expired = Vec::new();
        let mut i = 0;
        while i < state.waiters.len() {
            if now.duration_since(state.waiters[i].enqueued_at) >= timeout {
                let waiter = state.waiters.remove(i).expect("index in bounds");
                state.queued_memory = state.queued_memory.saturating_sub(waiter.size_estimate);
                expired.push(waiter);
            } else {
                i += 1;
            }
        }
        drop(state);

        for waiter in expired {
            let id = waiter.id;
            let _ = waiter.sender.send(WaitOutcome::Dropped(CommandError::BackPressure {
                kind: BackPressureKind::Timeout,
            }));
            #[cfg(feature = "tracing")]
            debug!(semaphore = %self.config.name, waiter = id, "waiter timed out");
            #[cfg(not(feature = "tracing"))]
            let _ = id;
            self.config.event_listeners.emit(&SemaphoreEvent::TimedOut {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        }
    }
}

/// A bounded, priority-aware permit pool guarding access to a shared
/// resource (C1).
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<Inner>,
}

impl Semaphore {
    /// Creates a new semaphore and spawns its waiter-timeout sweeper.
    ///
    /// The sweeper holds only a [`Weak`] reference, so it exits on its own
    /// once every clone of this `Semaphore` has been dropped.
    pub fn new(config: SemaphoreConfig) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                free_permits: config.max_concurrency,
                waiters: VecDeque::new(),
                queued_memory: 0,
                next_id: 0,
                shutdown: false,
            }),
            config,
        });
        spawn_sweeper(Arc::downgrade(&inner));
        Self { inner }
    }

    /// The configured permit count.
    pub fn max_concurrency(&self) -> usize {
        self.inner.config.max_concurrency
    }

    /// Number of permits currently in use.
    pub fn active(&self) -> usize {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.config.max_concurrency - state.free_permits
    }

    /// Number of callers currently queued.
    pub fn queued(&self) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiters
            .len()
    }

    /// Acquires a permit, queueing according to the configured strategy if
    /// none are immediately available.
    pub async fn acquire(
        &self,
        priority: Priority,
        estimated_size: usize,
        cancel: &CancelToken,
    ) -> Result<Permit, CommandError> {
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled {
                at: CancelPoint::WaitingForPermit,
            });
        }

        // Fast path: a free permit and an empty queue means no fairness
        // obligation to anyone else.
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.shutdown {
                return Err(CommandError::SemaphoreShutdown);
            }
            if state.free_permits > 0 && state.waiters.is_empty() {
                state.free_permits -= 1;
                let active = self.inner.config.max_concurrency - state.free_permits;
                drop(state);
                self.inner.config.event_listeners.emit(&SemaphoreEvent::Acquired {
                    name: self.inner.config.name.clone(),
                    timestamp: Instant::now(),
                    active,
                });
                return Ok(Permit::new(Arc::clone(&self.inner)));
            }
        }

        let (id, rx) = self.enqueue(priority, estimated_size)?;
        self.wait_for_grant(id, rx, cancel).await
    }

    fn enqueue(
        &self,
        priority: Priority,
        estimated_size: usize,
    ) -> Result<(u64, oneshot::Receiver<WaitOutcome>), CommandError> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.shutdown {
            return Err(CommandError::SemaphoreShutdown);
        }

        let active = self.inner.config.max_concurrency - state.free_permits;
        let queued = state.waiters.len();
        let max_outstanding = self.inner.config.max_outstanding;

        match self.inner.config.strategy {
            BackPressureStrategy::Suspend => {
                if active + queued + 1 > 2 * max_outstanding {
                    self.reject(&state, "queue full (suspend hard ceiling)");
                    return Err(CommandError::BackPressure {
                        kind: BackPressureKind::QueueFull,
                    });
                }
            }
            BackPressureStrategy::DropNewest => {
                if active + queued >= max_outstanding {
                    self.reject(&state, "queue full (drop-newest)");
                    return Err(CommandError::BackPressure {
                        kind: BackPressureKind::QueueFull,
                    });
                }
            }
            BackPressureStrategy::DropOldest => {
                if active + queued >= max_outstanding {
                    if let Some(oldest) = state.waiters.pop_front() {
                        state.queued_memory =
                            state.queued_memory.saturating_sub(oldest.size_estimate);
                        let wait_time = oldest.enqueued_at.elapsed();
                        let _ = oldest.sender.send(WaitOutcome::Dropped(CommandError::BackPressure {
                            kind: BackPressureKind::Dropped,
                        }));
                        self.inner.config.event_listeners.emit(&SemaphoreEvent::Dropped {
                            name: self.inner.config.name.clone(),
                            timestamp: Instant::now(),
                            wait_time,
                        });
                    }
                }
            }
            BackPressureStrategy::Error(_) => {
                if active + queued >= max_outstanding {
                    self.reject(&state, "queue full");
                    return Err(CommandError::BackPressure {
                        kind: BackPressureKind::QueueFull,
                    });
                }
            }
        }

        if let Some(limit) = self.inner.config.max_queue_memory {
            if state.queued_memory + estimated_size > limit {
                self.reject(&state, "queue memory budget exceeded");
                return Err(CommandError::BackPressure {
                    kind: BackPressureKind::MemoryPressure,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        let id = state.next_id;
        state.next_id += 1;
        let pos = state
            .waiters
            .iter()
            .position(|w| w.priority > priority)
            .unwrap_or(state.waiters.len());
        state.waiters.insert(
            pos,
            Waiter {
                id,
                priority,
                size_estimate: estimated_size,
                enqueued_at: Instant::now(),
                sender: tx,
            },
        );
        state.queued_memory += estimated_size;
        let queued_after = state.waiters.len();
        drop(state);

        self.inner.config.event_listeners.emit(&SemaphoreEvent::Queued {
            name: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            queued: queued_after,
        });

        Ok((id, rx))
    }

    fn reject(&self, _state: &State, reason: &'static str) {
        #[cfg(feature = "tracing")]
        warn!(semaphore = %self.inner.config.name, reason, "acquire rejected");
        self.inner.config.event_listeners.emit(&SemaphoreEvent::Rejected {
            name: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            reason,
        });
    }

    async fn wait_for_grant(
        &self,
        id: u64,
        mut rx: oneshot::Receiver<WaitOutcome>,
        cancel: &CancelToken,
    ) -> Result<Permit, CommandError> {
        let per_acquire_timeout = match self.inner.config.strategy {
            BackPressureStrategy::Error(Some(timeout)) => Some(timeout),
            _ => None,
        };

        let outcome = if let Some(timeout) = per_acquire_timeout {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.reclaim_on_cancel(id, &mut rx).await;
                }
                res = tokio::time::timeout(timeout, &mut rx) => {
                    match res {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(_)) => {
                            return Err(CommandError::SemaphoreShutdown);
                        }
                        Err(_) => {
                            self.inner.remove_waiter(id);
                            return Err(CommandError::BackPressure { kind: BackPressureKind::Timeout });
                        }
                    }
                }
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.reclaim_on_cancel(id, &mut rx).await;
                }
                res = &mut rx => {
                    match res {
                        Ok(outcome) => outcome,
                        Err(_) => return Err(CommandError::SemaphoreShutdown),
                    }
                }
            }
        };

        match outcome {
            WaitOutcome::Granted => Ok(Permit::new(Arc::clone(&self.inner))),
            WaitOutcome::Dropped(err) => Err(err),
        }
    }

    /// Handles a cancellation that raced with this waiter being popped off
    /// the queue. If the waiter was already removed by another path (most
    /// commonly `do_release` granting it a permit) before we got to it, the
    /// outcome is still in flight on `rx` — wait for it and, if it turns out
    /// to be `Granted`, hand the permit back through the same release path a
    /// dropped `Permit` takes, rather than leaking it out of `free_permits`.
    async fn reclaim_on_cancel(
        &self,
        id: u64,
        rx: &mut oneshot::Receiver<WaitOutcome>,
    ) -> Result<Permit, CommandError> {
        if self.inner.remove_waiter(id) {
            return Err(CommandError::Cancelled {
                at: CancelPoint::WaitingForPermit,
            });
        }

        // The waiter was already popped by someone else; its outcome is
        // guaranteed to be sent (every path that pops a waiter sends one),
        // so wait for it rather than risk missing it with a single
        // non-blocking `try_recv`.
        if let Ok(WaitOutcome::Granted) = rx.await {
            self.inner.do_release();
        }
        Err(CommandError::Cancelled {
            at: CancelPoint::WaitingForPermit,
        })
    }

    /// Shuts the semaphore down: stops future acquires and fails every
    /// currently-queued waiter with [`CommandError::SemaphoreShutdown`].
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.shutdown = true;
        let waiters = std::mem::take(&mut state.waiters);
        state.queued_memory = 0;
        drop(state);
        for waiter in waiters {
            let _ = waiter.sender.send(WaitOutcome::Dropped(CommandError::SemaphoreShutdown));
        }
    }
}

fn spawn_sweeper(inner: Weak<Inner>) {
    let interval = match inner.upgrade() {
        Some(inner) => inner.config.sweep_interval,
        None => return,
    };
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match inner.upgrade() {
                Some(inner) => inner.sweep(),
                None => return,
            }
        }
    });
}
