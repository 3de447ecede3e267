//! The permit token returned by [`crate::Semaphore::acquire`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::semaphore::Inner;

/// A uniquely-owned handle to one outstanding permit.
///
/// Dropping a `Permit` releases it. Calling [`Permit::release`] releases it
/// early (and synchronously); either path is idempotent and a permit is
/// released exactly once regardless of which combination of explicit
/// release and drop a caller exercises.
pub struct Permit {
    inner: Arc<Inner>,
    released: AtomicBool,
}

impl Permit {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            released: AtomicBool::new(false),
        }
    }

    /// Releases the permit immediately rather than waiting for this value
    /// to drop. Calling this more than once, or calling it and then letting
    /// the value drop, releases the underlying permit exactly once.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.do_release();
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.do_release();
    }
}
