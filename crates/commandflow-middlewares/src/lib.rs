//! Cross-cutting middlewares (C8): validation, authorization, security
//! policy, rate limiting, resilience, parallel fan-out, audit logging, and
//! encryption, all built on the [`commandflow_middleware`] chain engine
//! (C5).
//!
//! # Example
//! ```
//! use commandflow_core::{Command, CommandError, Validatable};
//! use commandflow_middleware::MiddlewareChain;
//! use commandflow_middlewares::validation::ValidationMiddleware;
//! use std::sync::Arc;
//!
//! struct CreateUser {
//!     name: String,
//! }
//!
//! impl Command for CreateUser {
//!     type Output = ();
//! }
//!
//! impl Validatable for CreateUser {
//!     fn validate(&self) -> Result<(), CommandError> {
//!         if self.name.is_empty() {
//!             Err(CommandError::Validation {
//!                 field: Some("name".into()),
//!                 reason: commandflow_core::ValidationReason::MissingRequired,
//!             })
//!         } else {
//!             Ok(())
//!         }
//!     }
//! }
//!
//! # fn example() {
//! let validation = ValidationMiddleware::new();
//! validation.register::<CreateUser>();
//!
//! let mut chain = MiddlewareChain::new(100);
//! chain.add(Arc::new(validation)).unwrap();
//! # }
//! ```

pub mod audit;
pub mod authorization;
mod clone_registry;
pub mod encryption;
pub mod fanout;
pub mod rate_limit;
pub mod resilience;
pub mod security;
pub mod validation;

pub use audit::{AuditEntry, AuditLoggingMiddleware, AuditSink, NoopAuditSink};
pub use authorization::{AuthorizationMiddleware, RoleLookup};
pub use clone_registry::CloneRegistry;
pub use encryption::{Encryptable, EncryptionMiddleware, Encryptor, KeyStore};
pub use fanout::{FanoutStrategy, ParallelFanoutMiddleware};
pub use rate_limit::{RateLimitScope, RateLimitStrategy, RateLimitingMiddleware};
pub use resilience::ResilienceMiddleware;
pub use security::{SecurityInspectable, SecurityPolicyConfig, SecurityPolicyMiddleware};
pub use validation::ValidationMiddleware;
