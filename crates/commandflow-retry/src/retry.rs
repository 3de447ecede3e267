//! The retry envelope (C3): attempt loop, delay strategy, and composition
//! with the circuit breaker (C2).

use std::future::Future;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

use commandflow_circuitbreaker::CircuitBreaker;
use commandflow_core::{CancelPoint, CancelToken, CommandError};

use crate::config::RetryConfig;
use crate::events::RetryEvent;

/// Wraps an operation in a bounded attempt loop, consulting an optional
/// circuit breaker before each attempt and reporting outcomes back to it.
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy from the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A reasonable default policy; see [`RetryConfig::standard`].
    pub fn standard() -> Self {
        Self::new(RetryConfig::standard())
    }

    /// Runs `op` under this retry policy.
    ///
    /// `op` is invoked with the 1-based attempt number. If `circuit` is
    /// given, each attempt first consults `should_allow`, and reports
    /// `record_success`/`record_failure` back to it — mirroring the
    /// pseudocode in the retry envelope's composition with the circuit
    /// breaker.
    pub async fn execute<F, Fut, T>(
        &self,
        circuit: Option<&CircuitBreaker>,
        cancel: &CancelToken,
        mut op: F,
    ) -> Result<T, CommandError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CommandError>>,
    {
        let mut last_error: Option<CommandError> = None;

        for attempt in 1..=self.config.max_attempts {
            if let Some(circuit) = circuit {
                if !circuit.should_allow() {
                    return Err(CommandError::CircuitBreakerOpen {
                        name: Some(circuit.name().to_string()),
                    });
                }
            }

            match op(attempt).await {
                Ok(value) => {
                    if let Some(circuit) = circuit {
                        circuit.record_success();
                    }
                    #[cfg(feature = "metrics")]
                    counter!("commandflow_retry_succeeded_total", "name" => self.config.name.clone())
                        .increment(1);
                    self.config.event_listeners.emit(&RetryEvent::Succeeded {
                        name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    return Ok(value);
                }
                Err(err) => {
                    if let Some(circuit) = circuit {
                        circuit.record_failure();
                    }

                    let retryable = (self.config.retry_on)(&err);
                    if !retryable {
                        self.config.event_listeners.emit(&RetryEvent::NotRetried {
                            name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                        });
                        return Err(err);
                    }

                    if attempt == self.config.max_attempts {
                        self.config.event_listeners.emit(&RetryEvent::Exhausted {
                            name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        return Err(CommandError::RetryExhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }

                    let delay = self.config.delay_strategy.delay(attempt);
                    self.config.event_listeners.emit(&RetryEvent::Retrying {
                        name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });
                    last_error = Some(err);

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(CommandError::Cancelled { at: CancelPoint::RetryDelay });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // Unreachable in practice: max_attempts >= 1 guarantees the loop
        // above always returns. Kept as a defensive fallback rather than
        // `unreachable!()` so a future change to the loop fails safe.
        Err(last_error.unwrap_or_else(|| CommandError::ExecutionFailed(
            "retry loop exited without a result".to_string(),
        )))
    }
}
