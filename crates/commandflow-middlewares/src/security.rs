//! Security policy middleware: size/length/charset/HTML limits enforced
//! against commands that opt in to inspection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use commandflow_core::{BoxFuture, Command, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

/// Gives the security policy middleware read access to a command's
/// string fields and an approximate encoded size, without requiring every
/// command type to pay for reflection it doesn't need.
pub trait SecurityInspectable {
    /// Every string-valued field subject to length/charset/HTML checks.
    fn inspected_strings(&self) -> Vec<&str>;
    /// An approximate serialized size in bytes, checked against
    /// `max_command_size`.
    fn approximate_size(&self) -> usize;
}

type InspectFn = Arc<dyn Fn(&Erased) -> (Vec<String>, usize) + Send + Sync>;

/// Recognized configuration keys (spec §6): size caps, string-length caps,
/// allowed character set, and an HTML-rejection switch.
#[derive(Clone)]
pub struct SecurityPolicyConfig {
    pub max_command_size: Option<usize>,
    pub max_string_length: Option<usize>,
    pub allow_html: bool,
    pub allowed_character_set: Option<fn(char) -> bool>,
}

impl SecurityPolicyConfig {
    /// Generous limits, HTML allowed: suitable for internal/trusted callers.
    pub fn default_profile() -> Self {
        Self {
            max_command_size: Some(1_000_000),
            max_string_length: Some(10_000),
            allow_html: true,
            allowed_character_set: None,
        }
    }

    /// Tight limits, no HTML, printable ASCII only: suitable for
    /// untrusted, internet-facing callers.
    pub fn strict() -> Self {
        Self {
            max_command_size: Some(16_384),
            max_string_length: Some(256),
            allow_html: false,
            allowed_character_set: Some(|c| c.is_ascii_graphic() || c == ' '),
        }
    }
}

impl Default for SecurityPolicyConfig {
    fn default() -> Self {
        Self::default_profile()
    }
}

/// Enforces [`SecurityPolicyConfig`] against commands registered via
/// [`SecurityPolicyMiddleware::register`]; unregistered command types are
/// passed through unchecked, mirroring the validation middleware's
/// type-erasure-boundary registry.
pub struct SecurityPolicyMiddleware {
    config: SecurityPolicyConfig,
    inspectors: RwLock<HashMap<TypeId, InspectFn>>,
}

impl SecurityPolicyMiddleware {
    pub fn new(config: SecurityPolicyConfig) -> Self {
        Self {
            config,
            inspectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<C>(&self)
    where
        C: Command + SecurityInspectable,
    {
        self.inspectors.write().unwrap_or_else(|e| e.into_inner()).insert(
            TypeId::of::<C>(),
            Arc::new(|command: &Erased| {
                let command = command.downcast_ref::<C>().expect("keyed by TypeId::of::<C>()");
                (
                    command.inspected_strings().into_iter().map(str::to_owned).collect(),
                    command.approximate_size(),
                )
            }),
        );
    }

    fn check(&self, strings: &[String], size: usize) -> Result<(), CommandError> {
        if let Some(max) = self.config.max_command_size {
            if size > max {
                return Err(CommandError::SecurityPolicy(format!(
                    "command size {size} exceeds the {max}-byte limit"
                )));
            }
        }

        for s in strings {
            if let Some(max_len) = self.config.max_string_length {
                if s.len() > max_len {
                    return Err(CommandError::SecurityPolicy(format!(
                        "string length {} exceeds the {max_len}-character limit",
                        s.len()
                    )));
                }
            }
            if !self.config.allow_html && (s.contains('<') || s.contains('>')) {
                return Err(CommandError::SecurityPolicy("HTML content is not permitted".into()));
            }
            if let Some(allowed) = self.config.allowed_character_set {
                if let Some(bad) = s.chars().find(|c| !allowed(*c)) {
                    return Err(CommandError::SecurityPolicy(format!(
                        "character '{bad}' is not in the allowed set"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Middleware for SecurityPolicyMiddleware {
    fn name(&self) -> &str {
        "security-policy"
    }

    fn priority(&self) -> Priority {
        Priority::Validation
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let inspector = self
                .inspectors
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&(*command).type_id())
                .cloned();

            if let Some(inspect) = inspector {
                let (strings, size) = inspect(&command);
                self.check(&strings, size)?;
            }

            next.call(command).await
        })
    }
}
