//! The unified error taxonomy for commandflow.
//!
//! [`CommandError`] is the single error type that flows out of a pipeline
//! execution. Every infrastructure layer (semaphore, circuit breaker,
//! retry, middleware chain, cross-cutting middlewares) produces one of its
//! variants; application/handler failures are carried in the `Handler`
//! variant without commandflow needing to know their concrete type.

use std::fmt;
use std::time::Duration;

/// Where in the execution a cancellation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPoint {
    /// Before the chain started executing.
    BeforeStart,
    /// Before a specific middleware was entered.
    BeforeMiddleware,
    /// Before the terminal handler was invoked.
    BeforeHandler,
    /// While waiting on a semaphore permit.
    WaitingForPermit,
    /// While sleeping between retry attempts.
    RetryDelay,
}

impl fmt::Display for CancelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelPoint::BeforeStart => "before start",
            CancelPoint::BeforeMiddleware => "before middleware",
            CancelPoint::BeforeHandler => "before handler",
            CancelPoint::WaitingForPermit => "waiting for permit",
            CancelPoint::RetryDelay => "retry delay",
        };
        f.write_str(s)
    }
}

/// Why a back-pressure request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackPressureKind {
    /// The wait queue (or the hard outstanding ceiling) was full.
    QueueFull,
    /// The waiter exceeded its acquire timeout.
    Timeout,
    /// The waiter was dropped to admit a higher-priority arrival
    /// (`DropOldest`/`DropNewest`).
    Dropped,
    /// The configured queue memory budget was exceeded.
    MemoryPressure,
}

impl fmt::Display for BackPressureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackPressureKind::QueueFull => "queue full",
            BackPressureKind::Timeout => "timeout",
            BackPressureKind::Dropped => "dropped",
            BackPressureKind::MemoryPressure => "memory pressure",
        };
        f.write_str(s)
    }
}

/// Structured context attached to an error as it propagates up the chain.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The command type name this error originated from.
    pub command_type: Option<&'static str>,
    /// The middleware type name this error was raised or translated in.
    pub middleware_type: Option<&'static str>,
    /// Correlation id copied from the execution's context metadata.
    pub correlation_id: Option<String>,
    /// User id copied from the execution's context metadata.
    pub user_id: Option<String>,
}

/// Reason a validation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// A required field was missing or empty.
    MissingRequired,
    /// A field's value failed a format or range check.
    InvalidFormat,
    /// A custom, free-form reason.
    Custom(String),
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::MissingRequired => write!(f, "missing required field"),
            ValidationReason::InvalidFormat => write!(f, "invalid format"),
            ValidationReason::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

/// Reason an authorization check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationReason {
    /// The caller's identity could not be established.
    InvalidCredentials,
    /// The caller was identified but lacks the required role(s).
    InsufficientPermissions,
}

impl fmt::Display for AuthorizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthorizationReason::InvalidCredentials => "invalid credentials",
            AuthorizationReason::InsufficientPermissions => "insufficient permissions",
        };
        f.write_str(s)
    }
}

/// The unified commandflow error type.
///
/// Every infrastructure error funnels through this enum. Application
/// errors raised by a handler are boxed into [`CommandError::Handler`]
/// rather than carried as a generic type parameter, because a single bus
/// routes heterogeneous command types with heterogeneous error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    /// No handler is registered for the dispatched command type.
    #[error("no handler registered for command type {0}")]
    HandlerNotFound(&'static str),

    /// Adding a middleware would exceed the configured `max_depth`.
    #[error("middleware depth {depth} exceeds max_depth {max}")]
    MaxDepthExceeded {
        /// The depth that would result from the add.
        depth: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// A generic execution failure not covered by a more specific variant.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A middleware raised or translated an error, with context attached.
    #[error("middleware error: {message}")]
    Middleware {
        /// Human-readable description.
        message: String,
        /// Structured context.
        context: ErrorContext,
    },

    /// A timeout fired in the named layer.
    #[error("timeout in {layer}")]
    Timeout {
        /// The layer that timed out (e.g. "semaphore", "pipeline").
        layer: &'static str,
    },

    /// The retry envelope exhausted all configured attempts.
    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying error, rendered to a string.
        last: String,
    },

    /// Execution was cancelled.
    #[error("cancelled {at}")]
    Cancelled {
        /// Where the cancellation was observed.
        at: CancelPoint,
    },

    /// A command's [`Validatable`](crate::command::Validatable) check failed.
    #[error("validation failed{}: {reason}", field.as_ref().map(|f| format!(" for field {f}")).unwrap_or_default())]
    Validation {
        /// The field that failed, if identifiable.
        field: Option<String>,
        /// Why it failed.
        reason: ValidationReason,
    },

    /// An authorization check rejected the call.
    #[error("authorization failed: {reason}")]
    Authorization {
        /// Why it failed.
        reason: AuthorizationReason,
    },

    /// A security policy (size limits, character sets, HTML rejection) rejected the command.
    #[error("security policy violation: {0}")]
    SecurityPolicy(String),

    /// An encryption or decryption operation failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A rate limiter rejected the call.
    #[error("rate limit exceeded, {remaining} remaining, resets in {reset_at:?}")]
    RateLimitExceeded {
        /// Permits remaining in the current window (always 0 when this fires).
        remaining: u64,
        /// Approximately how long until more capacity is available.
        reset_at: Duration,
    },

    /// The circuit breaker is open (or half-open and out of probe slots).
    #[error("circuit breaker '{name:?}' is open")]
    CircuitBreakerOpen {
        /// Circuit breaker name, if configured.
        name: Option<String>,
    },

    /// A back-pressure semaphore rejected or failed to admit the call.
    #[error("back pressure: {kind}")]
    BackPressure {
        /// Which back-pressure condition fired.
        kind: BackPressureKind,
    },

    /// The semaphore has been shut down and can no longer admit callers.
    #[error("semaphore shut down")]
    SemaphoreShutdown,

    /// A middleware's `next` continuation was invoked a second time.
    #[error("next() already called")]
    NextAlreadyCalled,

    /// A middleware's `next` continuation was invoked while a prior call to
    /// it was still in flight.
    #[error("next() currently executing")]
    NextCurrentlyExecuting,

    /// A middleware returned without calling `next` and didn't declare the
    /// `Unsafe` capability (debug builds only).
    #[error("next() never called")]
    NextNeverCalled,

    /// The handler itself failed. Opaque because the bus routes
    /// heterogeneous command/error types.
    #[error("handler error: {0}")]
    Handler(String),
}

impl CommandError {
    /// Returns `true` if the retry envelope should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CommandError::Timeout { .. }
                | CommandError::CircuitBreakerOpen { .. }
                | CommandError::BackPressure { .. }
                | CommandError::RateLimitExceeded { .. }
        )
    }

    /// Returns `true` if this is a security-related rejection (validation,
    /// authorization, or security policy).
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            CommandError::Validation { .. }
                | CommandError::Authorization { .. }
                | CommandError::SecurityPolicy(_)
        )
    }

    /// Returns `true` if this represents a cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CommandError::Cancelled { .. })
    }

    /// Returns `true` if this is a timeout from any layer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Timeout { .. })
    }

    /// Wraps this error with middleware context, preserving the message.
    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            CommandError::Middleware { message, .. } => CommandError::Middleware { message, context },
            other => CommandError::Middleware {
                message: other.to_string(),
                context,
            },
        }
    }
}
