//! Authorization middleware: checks the caller's roles (via a pluggable
//! lookup function) against a required set before `next`.

use std::collections::HashSet;
use std::sync::Arc;

use commandflow_core::{AuthorizationReason, BoxFuture, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

/// Looks up the roles held by a user id. Commonly backed by a session
/// store or an identity provider client outside this crate's scope.
pub type RoleLookup = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Requires the caller (identified via [`commandflow_core::Metadata::user_id`])
/// to hold every role in `required_roles`.
pub struct AuthorizationMiddleware {
    role_lookup: RoleLookup,
    required_roles: HashSet<String>,
}

impl AuthorizationMiddleware {
    pub fn new(role_lookup: RoleLookup, required_roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            role_lookup,
            required_roles: required_roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Middleware for AuthorizationMiddleware {
    fn name(&self) -> &str {
        "authorization"
    }

    fn priority(&self) -> Priority {
        Priority::Authentication
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let user_id = ctx.metadata().user_id.as_deref().ok_or(CommandError::Authorization {
                reason: AuthorizationReason::InvalidCredentials,
            })?;

            let held: HashSet<String> = (self.role_lookup)(user_id).into_iter().collect();
            if !self.required_roles.is_subset(&held) {
                return Err(CommandError::Authorization {
                    reason: AuthorizationReason::InsufficientPermissions,
                });
            }

            next.call(command).await
        })
    }
}
