//! The type-erased pipeline surface consumed by `commandflow-bus`.

use std::any::TypeId;
use std::sync::Arc;

use commandflow_circuitbreaker::CircuitState;
use commandflow_core::{BoxFuture, CancelToken, CommandError, Context};
use commandflow_middleware::{Erased, Middleware};

/// Object-safe view of a [`crate::Pipeline`], used by the bus to hold
/// pipelines of heterogeneous command types behind one `TypeId`-keyed map.
///
/// `commandflow-bus` pairs each `Arc<dyn ErasedPipeline>` with the original
/// `Arc<Pipeline<C>>` (as `Arc<dyn Any + Send + Sync>`) so typed dispatch
/// (`send::<C>`) can still downcast back to the concrete type; this trait
/// only needs to cover the operations that don't require knowing `C`.
pub trait ErasedPipeline: Send + Sync {
    /// Runs the pipeline against a type-erased command, performing the one
    /// required type check at the boundary (spec §4.6): a mismatch fails
    /// with `ExecutionFailed("Invalid command type")`.
    fn execute_erased<'a>(
        &'a self,
        command: Erased,
        context: Context,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Erased, CommandError>>;

    fn add_middleware(&self, middleware: Arc<dyn Middleware>) -> Result<(), CommandError>;
    fn add_middlewares(&self, middlewares: Vec<Arc<dyn Middleware>>) -> Result<(), CommandError>;
    fn remove_middleware_by_type_id(&self, id: TypeId) -> usize;
    fn clear_middlewares(&self) -> usize;
    fn middleware_names(&self) -> Vec<String>;
    fn middleware_count(&self) -> usize;
    fn circuit_state(&self) -> Option<CircuitState>;
}
