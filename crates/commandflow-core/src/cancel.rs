//! Cooperative cancellation.
//!
//! The teacher workspace depends only on `tokio`'s `sync`/`time` features,
//! not `tokio-util`, so rather than pull in a new dependency for one small
//! type, cancellation here is a lightweight flag plus an optional
//! [`tokio::sync::Notify`] for tasks that want to wake promptly on cancel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cooperative cancellation signal shared across a task tree.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Creates a new, not-yet-cancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Marks this token (and every clone of it) as cancelled, and wakes any
    /// tasks waiting on [`Self::cancelled`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` if [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once this token is cancelled. Useful in a `tokio::select!`
    /// alongside a sleep or an I/O future.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        // Notify doesn't replay past notifications to a waiter that starts
        // listening after notify_waiters() fired, so re-check right after
        // registering interest to close the race.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// A never-cancelled token, for call sites that don't participate in
    /// cancellation (e.g. a top-level `execute` convenience method).
    pub fn none() -> Self {
        Self::new()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
