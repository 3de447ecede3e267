//! Configuration for the retry envelope.

use crate::delay::DelayStrategy;
use crate::events::RetryEvent;
use commandflow_core::{CommandError, EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// A predicate deciding whether a given error should be retried.
pub type RetryPredicate = Arc<dyn Fn(&CommandError) -> bool + Send + Sync>;

/// Configuration for a [`crate::RetryPolicy`].
#[derive(Clone)]
pub struct RetryConfig {
    pub(crate) max_attempts: u32,
    pub(crate) delay_strategy: DelayStrategy,
    pub(crate) retry_on: RetryPredicate,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// A reasonable default: 3 attempts, exponential backoff from 100ms
    /// capped at 10s, default retryability classification.
    pub fn standard() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_attempts: u32,
    delay_strategy: DelayStrategy,
    retry_on: RetryPredicate,
    name: String,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            delay_strategy: DelayStrategy::Exponential {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                cap: Duration::from_secs(10),
                jitter: 0.0,
            },
            retry_on: Arc::new(CommandError::is_retryable),
            name: "retry".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of attempts, including the initial one.
    /// Default: 3.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay strategy. Default: exponential from 100ms, capped at
    /// 10s, no jitter.
    pub fn delay_strategy(mut self, strategy: DelayStrategy) -> Self {
        self.delay_strategy = strategy;
        self
    }

    /// Overrides which errors are retried. Default:
    /// [`CommandError::is_retryable`].
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CommandError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(predicate);
        self
    }

    /// Sets the name of this retry policy instance.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked before sleeping ahead of a retry.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retrying { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when attempts are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            delay_strategy: self.delay_strategy,
            retry_on: self.retry_on,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
