//! The handler registry & command bus (C7).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use commandflow_circuitbreaker::CircuitState;
use commandflow_core::{CancelToken, Command, CommandError, Context, Handler, Metadata};
use commandflow_middleware::Middleware;
use commandflow_pipeline::{ErasedPipeline, Pipeline, PipelineOptions};
use commandflow_retry::RetryPolicy;

struct Registration {
    /// The concrete `Arc<Pipeline<C>>`, kept as `Any` so `send::<C>` can
    /// downcast back to it; the downcast is infallible since this entry is
    /// only ever stored under `TypeId::of::<C>()`.
    pipeline: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedPipeline>,
    command_type_name: &'static str,
}

/// Routes commands to their registered handler through a shared,
/// priority-ordered middleware chain (spec §4.7).
///
/// One [`Pipeline`] is built per registered command type; middleware added
/// to the bus is propagated to every pipeline registered so far and to
/// every one registered afterward.
pub struct CommandBus {
    handlers: RwLock<HashMap<TypeId, Registration>>,
    middlewares: Mutex<Vec<Arc<dyn Middleware>>>,
    max_depth: usize,
}

impl CommandBus {
    /// Creates an empty bus with the default middleware depth cap (100).
    pub fn new() -> Self {
        Self::with_max_depth(100)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            middlewares: Mutex::new(Vec::new()),
            max_depth,
        }
    }

    /// Registers `handler` for command type `C` with default pipeline
    /// options, applying every middleware already installed on this bus.
    /// Replaces any prior registration for `C`.
    pub fn register<C, H>(&self, handler: H)
    where
        C: Command,
        H: Handler<C> + 'static,
    {
        self.register_with_options(handler, PipelineOptions::default());
    }

    /// Registers `handler` for command type `C` with explicit pipeline
    /// options (concurrency, back-pressure, context behavior, depth cap).
    pub fn register_with_options<C, H>(&self, handler: H, options: PipelineOptions)
    where
        C: Command,
        H: Handler<C> + 'static,
    {
        let pipeline = Pipeline::with_options(handler, options);
        let master = self.middlewares.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if !master.is_empty() {
            pipeline
                .add_middlewares(master)
                .expect("bus-level middleware list already fit within its own max_depth");
        }

        let pipeline = Arc::new(pipeline);
        let registration = Registration {
            erased: Arc::clone(&pipeline) as Arc<dyn ErasedPipeline>,
            pipeline: pipeline as Arc<dyn Any + Send + Sync>,
            command_type_name: std::any::type_name::<C>(),
        };

        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(TypeId::of::<C>(), registration);
    }

    /// Dispatches `command` through its registered pipeline, making exactly
    /// one attempt. Fails with [`CommandError::HandlerNotFound`] if no
    /// handler is registered for `C`.
    pub async fn send<C: Command>(
        &self,
        command: C,
        metadata: Option<Metadata>,
    ) -> Result<C::Output, CommandError> {
        self.send_cancellable(command, metadata, &CancelToken::none()).await
    }

    pub async fn send_cancellable<C: Command>(
        &self,
        command: C,
        metadata: Option<Metadata>,
        cancel: &CancelToken,
    ) -> Result<C::Output, CommandError> {
        let pipeline = self.typed_pipeline::<C>()?;
        let context = metadata.map(Context::with_metadata);
        pipeline.execute_cancellable(command, context, cancel).await
    }

    /// Dispatches `command` under `retry_policy`, replaying the same
    /// (cloned) command on every attempt and consulting the pipeline's
    /// bound circuit breaker, if any, exactly once per attempt (spec
    /// §4.7's "builds the retry envelope" send variant).
    pub async fn send_with_retry<C>(
        &self,
        command: C,
        metadata: Option<Metadata>,
        retry_policy: &RetryPolicy,
    ) -> Result<C::Output, CommandError>
    where
        C: Command + Clone,
    {
        self.send_with_retry_cancellable(command, metadata, retry_policy, &CancelToken::none())
            .await
    }

    pub async fn send_with_retry_cancellable<C>(
        &self,
        command: C,
        metadata: Option<Metadata>,
        retry_policy: &RetryPolicy,
        cancel: &CancelToken,
    ) -> Result<C::Output, CommandError>
    where
        C: Command + Clone,
    {
        let pipeline = self.typed_pipeline::<C>()?;
        let ctx = metadata.map(Context::with_metadata).unwrap_or_else(Context::with_default_metadata);
        let circuit_breaker = pipeline.circuit_breaker();

        retry_policy
            .execute(circuit_breaker.as_deref(), cancel, |_attempt| {
                let pipeline = Arc::clone(&pipeline);
                let command = command.clone();
                let ctx = ctx.clone();
                async move { pipeline.execute_once(command, Some(ctx), cancel).await }
            })
            .await
    }

    fn typed_pipeline<C: Command>(&self) -> Result<Arc<Pipeline<C>>, CommandError> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let registration = handlers
            .get(&TypeId::of::<C>())
            .ok_or(CommandError::HandlerNotFound(std::any::type_name::<C>()))?;
        Ok(Arc::clone(&registration.pipeline)
            .downcast::<Pipeline<C>>()
            .expect("registration is keyed by TypeId::of::<C>()"))
    }

    /// Appends one middleware to every registered pipeline (present and
    /// future), subject to each pipeline's own `max_depth`.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) -> Result<(), CommandError> {
        self.add_middlewares(vec![middleware])
    }

    /// Appends several middleware atomically to the bus's master list, then
    /// propagates them to every currently registered pipeline. Fails
    /// without touching the master list if the combined count would
    /// exceed the bus's own `max_depth`. Individual pipelines registered
    /// with a smaller `max_depth` than the bus can still reject the
    /// propagation; such a pipeline is left out of sync with the master
    /// list (its own error is still returned to the caller).
    pub fn add_middlewares(&self, middlewares: Vec<Arc<dyn Middleware>>) -> Result<(), CommandError> {
        let mut master = self.middlewares.lock().unwrap_or_else(|e| e.into_inner());
        let prospective_len = master.len() + middlewares.len();
        if prospective_len > self.max_depth {
            return Err(CommandError::MaxDepthExceeded {
                depth: prospective_len,
                max: self.max_depth,
            });
        }

        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for registration in handlers.values() {
            registration.erased.add_middlewares(middlewares.clone())?;
        }

        master.extend(middlewares);
        Ok(())
    }

    /// Removes every middleware of concrete type `M` from the bus's master
    /// list and every registered pipeline.
    pub fn remove_middleware_by_type<M: Middleware>(&self) -> usize {
        let id = TypeId::of::<M>();
        let mut master = self.middlewares.lock().unwrap_or_else(|e| e.into_inner());
        let before = master.len();
        master.retain(|m| m.as_any().type_id() != id);
        let removed_from_master = before - master.len();

        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for registration in handlers.values() {
            registration.erased.remove_middleware_by_type_id(id);
        }
        removed_from_master
    }

    /// Removes every middleware from the bus's master list and every
    /// registered pipeline.
    pub fn clear_middlewares(&self) -> usize {
        let mut master = self.middlewares.lock().unwrap_or_else(|e| e.into_inner());
        let n = master.len();
        master.clear();

        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for registration in handlers.values() {
            registration.erased.clear_middlewares();
        }
        n
    }

    /// Removes every registered handler and every installed middleware.
    pub fn clear(&self) {
        self.handlers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.middlewares.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn has_handler<C: Command>(&self) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&TypeId::of::<C>())
    }

    pub fn has_middleware<M: Middleware>(&self) -> bool {
        let id = TypeId::of::<M>();
        self.middlewares
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.as_any().type_id() == id)
    }

    /// Names of every middleware on the bus's master list, in execution
    /// order.
    pub fn middleware_types(&self) -> Vec<String> {
        self.middlewares
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// `type_name` of every registered command type.
    pub fn registered_command_types(&self) -> Vec<&'static str> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|r| r.command_type_name)
            .collect()
    }

    /// The circuit breaker state bound to `C`'s pipeline, if any.
    pub fn circuit_state<C: Command>(&self) -> Option<CircuitState> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<C>())
            .and_then(|r| r.erased.circuit_state())
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}
