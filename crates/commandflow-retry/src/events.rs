//! Events emitted by a [`crate::RetryPolicy`].

use commandflow_core::CommandEvent;
use std::time::{Duration, Instant};

/// Events emitted as a retry envelope attempts, retries, and resolves an
/// operation.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be attempted after a failure.
    Retrying {
        /// Name of the retry policy instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The attempt number that just failed (1-based).
        attempt: u32,
        /// How long before the next attempt.
        delay: Duration,
    },
    /// The operation succeeded (on the first attempt or after retries).
    Succeeded {
        /// Name of the retry policy instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Total attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed and all were retryable; attempts are exhausted.
    Exhausted {
        /// Name of the retry policy instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Total attempts made.
        attempts: u32,
    },
    /// An attempt failed with an error the predicate does not consider
    /// retryable; failed immediately without consuming another attempt.
    NotRetried {
        /// Name of the retry policy instance.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The attempt number that failed (1-based).
        attempt: u32,
    },
}

impl CommandEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retrying { .. } => "retrying",
            RetryEvent::Succeeded { .. } => "succeeded",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::NotRetried { .. } => "not_retried",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retrying { timestamp, .. }
            | RetryEvent::Succeeded { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::NotRetried { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RetryEvent::Retrying { name, .. }
            | RetryEvent::Succeeded { name, .. }
            | RetryEvent::Exhausted { name, .. }
            | RetryEvent::NotRetried { name, .. } => name,
        }
    }
}
