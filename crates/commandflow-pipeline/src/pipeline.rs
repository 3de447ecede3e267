//! [`Pipeline`]: binds one command type, one handler, a middleware chain,
//! and the optional C1/C2 resilience layers around it.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use commandflow_circuitbreaker::{CircuitBreaker, CircuitState};
use commandflow_core::{
    BoxFuture, CancelPoint, CancelToken, Command, CommandError, Context, Handler, Priority,
};
use commandflow_middleware::{Erased, ErasedHandler, Middleware, MiddlewareChain};
use commandflow_semaphore::{Semaphore, SemaphoreConfig};

use crate::erased::ErasedPipeline;
use crate::options::PipelineOptions;

/// Binds a concrete command type to its handler, middleware chain, and
/// optional back-pressure/circuit-breaking layers (spec §4.6).
///
/// Cheap to clone: the shared state lives behind an inner `Arc`, mirroring
/// `Semaphore`'s own clone-by-reference shape.
pub struct Pipeline<C: Command> {
    inner: Arc<Inner<C>>,
}

struct Inner<C: Command> {
    handler: Arc<dyn Handler<C>>,
    chain: Mutex<MiddlewareChain>,
    semaphore: Option<Semaphore>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    options: PipelineOptions,
}

impl<C: Command> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Command> Pipeline<C> {
    /// Builds a pipeline with default options and no circuit breaker.
    pub fn new(handler: impl Handler<C> + 'static) -> Self {
        Self::with_options(handler, PipelineOptions::default())
    }

    /// Builds a pipeline bound to `options`; if `options.max_concurrency`
    /// is set, a back-pressure semaphore is created to enforce it.
    pub fn with_options(handler: impl Handler<C> + 'static, options: PipelineOptions) -> Self {
        let semaphore = options.max_concurrency.map(|max| {
            let mut builder = SemaphoreConfig::builder()
                .max_concurrency(max)
                .strategy(options.back_pressure_strategy);
            if let Some(outstanding) = options.max_outstanding {
                builder = builder.max_outstanding(outstanding);
            }
            if let Some(memory) = options.max_queue_memory {
                builder = builder.max_queue_memory(memory);
            }
            Semaphore::new(builder.build())
        });

        Self {
            inner: Arc::new(Inner {
                handler: Arc::new(handler),
                chain: Mutex::new(MiddlewareChain::new(options.max_depth)),
                semaphore,
                circuit_breaker: None,
                options,
            }),
        }
    }

    /// Binds a circuit breaker (C2) in front of every execution.
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect(
            "with_circuit_breaker must be called before the pipeline is shared (clone or registration)",
        );
        inner.circuit_breaker = Some(Arc::new(breaker));
        self
    }

    /// Appends one middleware, failing if it would exceed `max_depth`.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) -> Result<(), CommandError> {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(middleware)
    }

    /// Appends several middleware atomically.
    pub fn add_middlewares(&self, middlewares: Vec<Arc<dyn Middleware>>) -> Result<(), CommandError> {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add_all(middlewares)
    }

    /// Removes every middleware of concrete type `M`.
    pub fn remove_middleware_by_type<M: Middleware>(&self) -> usize {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove_by_type::<M>()
    }

    /// Removes every installed middleware.
    pub fn clear_middlewares(&self) -> usize {
        self.inner.chain.lock().unwrap_or_else(|e| e.into_inner()).clear()
    }

    pub fn middleware_count(&self) -> usize {
        self.inner.chain.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn has_middleware<M: Middleware>(&self) -> bool {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .has_middleware::<M>()
    }

    /// Current circuit breaker state, if one is bound.
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.inner.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    /// The circuit breaker bound to this pipeline, if any. Exposed so a
    /// caller driving its own retry loop around [`Pipeline::execute_once`]
    /// (e.g. `commandflow-bus`'s `send_with_retry`) can consult the same
    /// breaker the retry envelope expects, without `execute_cancellable`
    /// double-gating it.
    pub fn circuit_breaker(&self) -> Option<Arc<CircuitBreaker>> {
        self.inner.circuit_breaker.clone()
    }

    /// The pipeline entry point (spec §6): a convenience over
    /// [`Pipeline::execute_cancellable`] with no external cancellation and
    /// a freshly created context when none is supplied.
    pub async fn execute(&self, command: C, context: Option<Context>) -> Result<C::Output, CommandError> {
        self.execute_cancellable(command, context, &CancelToken::none()).await
    }

    /// Runs `command` through this pipeline's circuit breaker gate (if
    /// any), permit, and middleware chain, observing `cancel`.
    ///
    /// Implements spec §4.6's five steps: cancellation check, permit
    /// acquisition, context initialization, chain execution (gated by the
    /// circuit breaker when one is bound), and permit release on every exit
    /// path.
    pub async fn execute_cancellable(
        &self,
        command: C,
        context: Option<Context>,
        cancel: &CancelToken,
    ) -> Result<C::Output, CommandError> {
        if let Some(breaker) = &self.inner.circuit_breaker {
            if !breaker.should_allow() {
                return Err(CommandError::CircuitBreakerOpen {
                    name: Some(breaker.name().to_string()),
                });
            }
            let result = self.execute_once(command, context, cancel).await;
            match &result {
                Ok(_) => breaker.record_success(),
                Err(_) => breaker.record_failure(),
            }
            result
        } else {
            self.execute_once(command, context, cancel).await
        }
    }

    /// Runs the pipeline exactly once, with no circuit-breaker gating:
    /// cancellation check, permit acquire, chain execution, permit
    /// release. Exposed so a caller composing its own retry envelope
    /// (spec §4.7's bus `send`) can wrap this single attempt without the
    /// circuit breaker being consulted twice.
    pub async fn execute_once(
        &self,
        command: C,
        context: Option<Context>,
        cancel: &CancelToken,
    ) -> Result<C::Output, CommandError> {
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled {
                at: CancelPoint::BeforeStart,
            });
        }

        let permit = match &self.inner.semaphore {
            Some(semaphore) => Some(semaphore.acquire(Priority::default(), 0, cancel).await?),
            None => None,
        };

        let ctx = match context {
            Some(ctx) => ctx,
            None if self.inner.options.use_context => Context::with_default_metadata(),
            None => {
                return Err(CommandError::ExecutionFailed(
                    "a context is required (use_context is false and none was supplied)".into(),
                ))
            }
        };

        let handler = Arc::clone(&self.inner.handler);
        let erased_handler: ErasedHandler = Arc::new(move |erased: Erased| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let command = *erased
                    .downcast::<C>()
                    .map_err(|_| CommandError::ExecutionFailed("Invalid command type".into()))?;
                let output = handler.handle(command).await?;
                Ok(Box::new(output) as Erased)
            })
        });

        // Snapshot the chain and drop the lock before running it: the
        // middleware list may keep mutating while this execution is in
        // flight (spec §4.5's "Recompilation" note), and a lock held across
        // the handler's await would otherwise serialize every execution
        // through this pipeline regardless of the semaphore's concurrency.
        let chain_snapshot = self.inner.chain.lock().unwrap_or_else(|e| e.into_inner()).snapshot();
        let result = chain_snapshot
            .execute(Box::new(command), &ctx, cancel, erased_handler)
            .await;

        // Permit drops here regardless of `result`, releasing on every exit
        // path including the error one.
        drop(permit);

        result.map(|erased| {
            *erased
                .downcast::<C::Output>()
                .expect("handler produced its own Output type")
        })
    }
}

impl<C: Command> ErasedPipeline for Pipeline<C> {
    fn execute_erased<'a>(
        &'a self,
        command: Erased,
        context: Context,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let command = *command
                .downcast::<C>()
                .map_err(|_| CommandError::ExecutionFailed("Invalid command type".into()))?;
            let output = self.execute_cancellable(command, Some(context), cancel).await?;
            Ok(Box::new(output) as Erased)
        })
    }

    fn add_middleware(&self, middleware: Arc<dyn Middleware>) -> Result<(), CommandError> {
        Pipeline::add_middleware(self, middleware)
    }

    fn add_middlewares(&self, middlewares: Vec<Arc<dyn Middleware>>) -> Result<(), CommandError> {
        Pipeline::add_middlewares(self, middlewares)
    }

    fn remove_middleware_by_type_id(&self, id: TypeId) -> usize {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove_by_type_id(id)
    }

    fn clear_middlewares(&self) -> usize {
        Pipeline::clear_middlewares(self)
    }

    fn middleware_names(&self) -> Vec<String> {
        self.inner
            .chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .middleware_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn middleware_count(&self) -> usize {
        Pipeline::middleware_count(self)
    }

    fn circuit_state(&self) -> Option<CircuitState> {
        Pipeline::circuit_state(self)
    }
}
