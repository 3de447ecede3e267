//! Validation middleware: invokes a command's [`Validatable`] capability,
//! if it has one, before `next`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use commandflow_core::{BoxFuture, Command, CommandError, Context, Priority, Validatable};
use commandflow_middleware::{Erased, Middleware, Next};

type ValidateFn = Arc<dyn Fn(&Erased) -> Result<(), CommandError> + Send + Sync>;

/// Validates commands that opt in by implementing [`Validatable`].
///
/// Middleware operate on a type-erased command, and Rust has no stable way
/// to downcast `&dyn Any` to `&dyn Validatable` directly, so each command
/// type that wants validation registers a closure keyed by its `TypeId`
/// (via [`ValidationMiddleware::register`]); types that never register are
/// passed through unchanged.
pub struct ValidationMiddleware {
    validators: RwLock<HashMap<TypeId, ValidateFn>>,
}

impl ValidationMiddleware {
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
        }
    }

    /// Opts command type `C` into validation: `C::validate()` runs before
    /// `next` on every execution of a `C` through this middleware.
    pub fn register<C>(&self)
    where
        C: Command + Validatable,
    {
        self.validators.write().unwrap_or_else(|e| e.into_inner()).insert(
            TypeId::of::<C>(),
            Arc::new(|command: &Erased| {
                command
                    .downcast_ref::<C>()
                    .expect("keyed by TypeId::of::<C>()")
                    .validate()
            }),
        );
    }
}

impl Default for ValidationMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &str {
        "validation"
    }

    fn priority(&self) -> Priority {
        Priority::Validation
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let validator = self
                .validators
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&(*command).type_id())
                .cloned();

            if let Some(validate) = validator {
                validate(&command)?;
            }

            next.call(command).await
        })
    }
}
