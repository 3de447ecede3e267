//! Per-execution command context (C4): an immutable metadata block plus a
//! typed, thread-safe key→value scratchpad shared by every middleware on a
//! chain.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// A witness type identifying one slot in a [`Context`]'s typed map.
///
/// Implementors are typically zero-sized marker structs; the associated
/// `Value` type is what gets stored and returned for that key.
pub trait ContextKey: Send + Sync + 'static {
    /// The value type stored under this key.
    type Value: Send + Sync + Clone + 'static;
}

/// Immutable, set-once metadata describing an execution.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Correlation id, typically propagated from an inbound request.
    pub correlation_id: Option<String>,
    /// Identity of the caller, if known.
    pub user_id: Option<String>,
    /// Free-form custom fields.
    pub custom: HashMap<String, String>,
}

struct Slot {
    value: Box<dyn Any + Send + Sync>,
    clone_fn: fn(&(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync>,
}

impl Slot {
    fn new<T: Send + Sync + Clone + 'static>(value: T) -> Self {
        fn clone_impl<T: Send + Sync + Clone + 'static>(
            value: &(dyn Any + Send + Sync),
        ) -> Box<dyn Any + Send + Sync> {
            Box::new(value.downcast_ref::<T>().expect("slot type mismatch").clone())
        }
        Self {
            value: Box::new(value),
            clone_fn: clone_impl::<T>,
        }
    }

    fn duplicate(&self) -> Slot {
        Slot {
            value: (self.clone_fn)(self.value.as_ref()),
            clone_fn: self.clone_fn,
        }
    }
}

/// Per-execution, concurrently-readable/writable scratchpad.
///
/// A single `Context` is shared among all middleware on one chain.
/// Writes are last-writer-wins; there is no transactional semantics.
/// Metadata is immutable after construction.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    metadata: Metadata,
    request_id: String,
    request_start_time: Instant,
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl Context {
    /// Creates a new context with the given metadata and request id.
    pub fn new(metadata: Metadata, request_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                metadata,
                request_id: request_id.into(),
                request_start_time: Instant::now(),
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a default context with a freshly generated request id.
    pub fn with_default_metadata() -> Self {
        Self::new(Metadata::default(), generate_request_id())
    }

    /// Creates a context from caller-supplied metadata with a freshly
    /// generated request id.
    pub fn with_metadata(metadata: Metadata) -> Self {
        Self::new(metadata, generate_request_id())
    }

    /// The immutable metadata block.
    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    /// The request id assigned when this context was created.
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// When this execution started.
    pub fn request_start_time(&self) -> Instant {
        self.inner.request_start_time
    }

    /// Reads the value stored under `K`, if any.
    pub fn get<K: ContextKey>(&self) -> Option<K::Value> {
        let slots = self.inner.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&TypeId::of::<K>())
            .and_then(|slot| slot.value.downcast_ref::<K::Value>())
            .cloned()
    }

    /// Writes (overwriting any existing) the value stored under `K`.
    pub fn set<K: ContextKey>(&self, value: K::Value) {
        let mut slots = self.inner.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert(TypeId::of::<K>(), Slot::new(value));
    }

    /// Removes the value stored under `K`, returning it if present.
    pub fn remove<K: ContextKey>(&self) -> Option<K::Value> {
        let mut slots = self.inner.slots.write().unwrap_or_else(|e| e.into_inner());
        slots
            .remove(&TypeId::of::<K>())
            .and_then(|slot| slot.value.downcast::<K::Value>().ok())
            .map(|boxed| *boxed)
    }

    /// Creates a child context with the same metadata and a shallow copy of
    /// the current entries. Used by parallel fan-out to isolate
    /// side-effects between concurrently running sibling middlewares;
    /// merges back into the parent are not automatic.
    pub fn fork(&self) -> Self {
        let slots = self.inner.slots.read().unwrap_or_else(|e| e.into_inner());
        let cloned: HashMap<TypeId, Slot> =
            slots.iter().map(|(k, v)| (*k, v.duplicate())).collect();
        drop(slots);

        Self {
            inner: Arc::new(ContextInner {
                metadata: self.inner.metadata.clone(),
                request_id: self.inner.request_id.clone(),
                request_start_time: self.inner.request_start_time,
                slots: RwLock::new(cloned),
            }),
        }
    }
}

fn generate_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{n:016x}")
}

/// A process-wide pool of reusable [`Context`] allocations.
///
/// Borrowing avoids re-allocating the inner `HashMap` on every execution
/// under high throughput; on return all mutable state is cleared so no
/// data leaks between executions.
pub struct ContextPool {
    free: Mutex<Vec<Arc<ContextInner>>>,
}

impl ContextPool {
    /// Creates a new, empty pool.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrows a context from the pool, or allocates a new one if empty.
    pub fn acquire(&self, metadata: Metadata, request_id: impl Into<String>) -> Context {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(inner) = free.pop() {
            drop(free);
            // Reset and reuse only if we're the sole owner; otherwise fall
            // back to a fresh allocation (the borrowed instance is still in
            // use elsewhere, which should not happen given pool discipline,
            // but is handled defensively).
            match Arc::try_unwrap(inner) {
                Ok(inner) => {
                    inner.slots.write().unwrap_or_else(|e| e.into_inner()).clear();
                    return Context {
                        inner: Arc::new(ContextInner {
                            metadata,
                            request_id: request_id.into(),
                            request_start_time: Instant::now(),
                            slots: inner.slots,
                        }),
                    };
                }
                Err(_) => return Context::new(metadata, request_id),
            }
        }
        Context::new(metadata, request_id)
    }

    /// Returns a context to the pool for reuse.
    pub fn release(&self, context: Context) {
        if let Ok(inner) = Arc::try_unwrap(context.inner) {
            let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
            free.push(Arc::new(inner));
        }
        // If other clones are still alive, drop silently; the pool simply
        // doesn't recover that allocation.
    }

    /// Number of contexts currently available for reuse.
    pub fn len(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if the pool has no free contexts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}
