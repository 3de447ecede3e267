//! Shared `TypeId`-keyed erased-clone registry.
//!
//! A type-erased command can't be cloned generically: `Erased` only
//! promises `Any + Send`. Any middleware that needs to replay a command
//! more than once (resilience's retry loop, the parallel fan-out
//! middleware) registers the command types it needs to clone here, the
//! same opt-in pattern [`crate::validation::ValidationMiddleware`] uses for
//! `Validatable`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use commandflow_core::Command;
use commandflow_middleware::Erased;

type ClonerFn = Arc<dyn Fn(&Erased) -> Erased + Send + Sync>;

#[derive(Default)]
pub struct CloneRegistry {
    cloners: RwLock<HashMap<TypeId, ClonerFn>>,
}

impl CloneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&self)
    where
        C: Command + Clone,
    {
        self.cloners.write().unwrap_or_else(|e| e.into_inner()).insert(
            TypeId::of::<C>(),
            Arc::new(|erased: &Erased| {
                let command = erased.downcast_ref::<C>().expect("keyed by TypeId::of::<C>()");
                Box::new(command.clone()) as Erased
            }),
        );
    }

    /// Clones `erased` if its concrete type was registered, `None` otherwise.
    pub fn clone_erased(&self, erased: &Erased) -> Option<Erased> {
        let cloner = self
            .cloners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(**erased).type_id())
            .cloned()?;
        Some(cloner(erased))
    }
}
