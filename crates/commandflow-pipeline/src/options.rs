//! Configuration recognized by a [`crate::Pipeline`].

use commandflow_semaphore::BackPressureStrategy;

/// Pipeline-level configuration (spec §6's "Pipeline" recognized-keys table).
///
/// `max_concurrency: None` means no back-pressure semaphore is bound at
/// all — the pipeline runs every call unbounded.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub max_concurrency: Option<usize>,
    pub max_outstanding: Option<usize>,
    pub max_queue_memory: Option<usize>,
    pub back_pressure_strategy: BackPressureStrategy,
    pub use_context: bool,
    pub max_depth: usize,
}

impl PipelineOptions {
    /// Returns a builder seeded with these defaults: unbounded concurrency,
    /// a default context is created whenever one isn't supplied, and a
    /// middleware depth cap of 100.
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::new()
    }

    /// A conservative preset for pipelines guarding an external dependency:
    /// bounded concurrency, a modest outstanding ceiling, and `Suspend`
    /// back-pressure rather than fail-fast, on the theory that a caller
    /// guarding a flaky downstream would rather wait a bit than reject.
    pub fn conservative() -> Self {
        Self {
            max_concurrency: Some(10),
            max_outstanding: Some(50),
            max_queue_memory: None,
            back_pressure_strategy: BackPressureStrategy::Suspend,
            use_context: true,
            max_depth: 100,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            max_outstanding: None,
            max_queue_memory: None,
            back_pressure_strategy: BackPressureStrategy::Error(None),
            use_context: true,
            max_depth: 100,
        }
    }
}

/// Builder for [`PipelineOptions`].
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: PipelineOptions::default(),
        }
    }

    /// Bounds concurrency and binds a back-pressure semaphore. Unset (the
    /// default) leaves the pipeline unbounded.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.options.max_concurrency = Some(max);
        self
    }

    pub fn max_outstanding(mut self, max: usize) -> Self {
        self.options.max_outstanding = Some(max);
        self
    }

    pub fn max_queue_memory(mut self, bytes: usize) -> Self {
        self.options.max_queue_memory = Some(bytes);
        self
    }

    pub fn back_pressure_strategy(mut self, strategy: BackPressureStrategy) -> Self {
        self.options.back_pressure_strategy = strategy;
        self
    }

    pub fn use_context(mut self, use_context: bool) -> Self {
        self.options.use_context = use_context;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn build(self) -> PipelineOptions {
        self.options
    }
}

impl Default for PipelineOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
