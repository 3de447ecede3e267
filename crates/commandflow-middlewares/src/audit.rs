//! Audit logging middleware: emits started/completed/failed records to an
//! injected [`AuditSink`], mirroring how [`commandflow_core::EventListener`]
//! is a trait the caller implements rather than a concrete logger this
//! crate would have to own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use commandflow_core::{BoxFuture, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

/// One audited command execution.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub command_type: &'static str,
    pub request_id: String,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
}

/// Receives audit records. Implementors typically forward to a log
/// aggregator, SIEM, or append-only store; this crate only defines the
/// seam.
pub trait AuditSink: Send + Sync {
    fn log_started(&self, entry: &AuditEntry);
    fn log_completed(&self, entry: &AuditEntry, duration: Duration);
    fn log_failed(&self, entry: &AuditEntry, error: &CommandError, duration: Duration);
}

/// Discards every record. The default sink for middleware built without an
/// explicit one.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn log_started(&self, _entry: &AuditEntry) {}
    fn log_completed(&self, _entry: &AuditEntry, _duration: Duration) {}
    fn log_failed(&self, _entry: &AuditEntry, _error: &CommandError, _duration: Duration) {}
}

/// Wraps `next` with start/completion/failure audit records. Carries no
/// behavioral effect on the command itself: an error from the sink would
/// indicate a bug in the caller's implementation, not this middleware.
pub struct AuditLoggingMiddleware {
    sink: Arc<dyn AuditSink>,
    command_type_name: &'static str,
}

impl AuditLoggingMiddleware {
    pub fn new<C: commandflow_core::Command>(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            command_type_name: std::any::type_name::<C>(),
        }
    }
}

impl Middleware for AuditLoggingMiddleware {
    fn name(&self) -> &str {
        "audit-logging"
    }

    fn priority(&self) -> Priority {
        Priority::Monitoring
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let entry = AuditEntry {
                command_type: self.command_type_name,
                request_id: ctx.request_id().to_string(),
                correlation_id: ctx.metadata().correlation_id.clone(),
                user_id: ctx.metadata().user_id.clone(),
            };

            self.sink.log_started(&entry);
            let start = Instant::now();
            let result = next.call(command).await;
            let duration = start.elapsed();

            match &result {
                Ok(_) => self.sink.log_completed(&entry, duration),
                Err(err) => self.sink.log_failed(&entry, err, duration),
            }

            result
        })
    }
}
