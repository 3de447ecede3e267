//! Core infrastructure for commandflow.
//!
//! This crate provides shared functionality used across every commandflow
//! component:
//! - The [`Command`]/[`Handler`]/[`Validatable`] traits
//! - The unified [`CommandError`] taxonomy
//! - The per-execution [`Context`] scratchpad (C4)
//! - A cooperative [`CancelToken`]
//! - The event/listener dispatch system reused by every cross-cutting
//!   middleware and resilience layer

pub mod cancel;
pub mod command;
pub mod context;
pub mod error;
pub mod events;
pub mod priority;

pub use cancel::CancelToken;
pub use command::{BoxFuture, Command, Handler, Validatable};
pub use context::{Context, ContextKey, ContextPool, Metadata};
pub use error::{
    AuthorizationReason, BackPressureKind, CancelPoint, CommandError, ErrorContext,
    ValidationReason,
};
pub use events::{CommandEvent, EventListener, EventListeners, FnListener};
pub use priority::Priority;
