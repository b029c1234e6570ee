//! Authorization for record operations
//!
//! Permission evaluation lives outside the record itself: an
//! [`AuthContext`] describes the caller, [`AuthPolicy`] values are parsed
//! from module configuration and a [`PolicyEvaluator`] decides whether a
//! caller may perform an [`Action`] on a record or read a given field.

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::module::ModuleDefinition;
use crate::core::record::Record;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying a comma-separated role list
pub const USER_ROLES_HEADER: &str = "x-user-roles";
/// Header marking an administrator
pub const ADMIN_HEADER: &str = "x-admin";
/// Header naming a calling service
pub const SERVICE_HEADER: &str = "x-service-name";

/// Authorization context extracted from a request
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// Authenticated user
    User { user_id: String, roles: Vec<String> },

    /// Service-to-service communication
    Service { service_name: String },

    /// System administrator
    Admin { admin_id: String },

    /// No authentication (public access)
    Anonymous,
}

impl AuthContext {
    /// Check if context represents an admin
    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    /// Check if context represents a service
    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    /// Identity written into `created_by` / `modified_user_id`
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            AuthContext::User { user_id, .. } => Some(user_id),
            AuthContext::Admin { admin_id } => Some(admin_id),
            AuthContext::Service { service_name } => Some(service_name),
            AuthContext::Anonymous => None,
        }
    }
}

/// Actions guarded by module policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Save,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::View => write!(f, "view"),
            Action::Save => write!(f, "save"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Authorization policy for an operation
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated caller
    Authenticated,

    /// User must have one of these roles
    HasRole(Vec<String>),

    /// Service-to-service only
    ServiceOnly,

    /// Admin only
    AdminOnly,

    /// Nobody
    Deny,

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    /// Check if auth context satisfies this policy
    pub fn check(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !matches!(context, AuthContext::Anonymous),

            AuthPolicy::HasRole(required_roles) => match context {
                AuthContext::User { roles, .. } => required_roles.iter().any(|r| roles.contains(r)),
                _ => false,
            },

            AuthPolicy::ServiceOnly => context.is_service(),

            AuthPolicy::AdminOnly => context.is_admin(),

            AuthPolicy::Deny => false,

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context)),

            AuthPolicy::Custom(f) => f(context),
        }
    }

    /// Parse policy from string (for YAML config)
    ///
    /// Unrecognized strings deny access. Configurations are checked with
    /// [`AuthPolicy::try_parse_policy`] at load time, so this only matters
    /// for schemas built in code.
    pub fn parse_policy(s: &str) -> Self {
        Self::try_parse_policy(s).unwrap_or(AuthPolicy::Deny)
    }

    /// Parse policy from string, or `None` if any part is unrecognized
    ///
    /// `a|b` means either policy is sufficient.
    pub fn try_parse_policy(s: &str) -> Option<Self> {
        if s.contains('|') {
            return s
                .split('|')
                .map(|p| Self::try_parse_policy(p.trim()))
                .collect::<Option<Vec<_>>>()
                .map(AuthPolicy::Or);
        }

        match s {
            "public" => Some(AuthPolicy::Public),
            "authenticated" => Some(AuthPolicy::Authenticated),
            "service_only" => Some(AuthPolicy::ServiceOnly),
            "admin_only" => Some(AuthPolicy::AdminOnly),
            "deny" | "none" => Some(AuthPolicy::Deny),
            s => s
                .strip_prefix("role:")
                .filter(|role| !role.is_empty())
                .map(|role| AuthPolicy::HasRole(vec![role.to_string()])),
        }
    }
}

/// Decides record- and field-level permissions
pub trait PolicyEvaluator: Send + Sync {
    /// May the caller perform `action` on this record?
    fn can_access(
        &self,
        context: &AuthContext,
        module: &ModuleDefinition,
        record: &Record,
        action: Action,
    ) -> bool;

    /// May the caller read this field of the module?
    fn can_read_field(&self, context: &AuthContext, module: &ModuleDefinition, field: &str)
    -> bool;
}

/// Evaluates the policies declared in module configuration
///
/// Admins pass every check. A field without its own `read` policy inherits
/// the module's view policy.
#[derive(Debug, Default, Clone)]
pub struct ConfigPolicyEvaluator;

impl ConfigPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for ConfigPolicyEvaluator {
    fn can_access(
        &self,
        context: &AuthContext,
        module: &ModuleDefinition,
        _record: &Record,
        action: Action,
    ) -> bool {
        if context.is_admin() {
            return true;
        }

        let policy = match action {
            Action::View => &module.acl.view,
            Action::Save => &module.acl.save,
            Action::Delete => &module.acl.delete,
        };
        AuthPolicy::parse_policy(policy).check(context)
    }

    fn can_read_field(
        &self,
        context: &AuthContext,
        module: &ModuleDefinition,
        field: &str,
    ) -> bool {
        if context.is_admin() {
            return true;
        }

        let policy = module
            .field(field)
            .and_then(|def| def.read)
            .unwrap_or_else(|| module.acl.view.clone());
        AuthPolicy::parse_policy(&policy).check(context)
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Extract auth context from HTTP request headers
    async fn extract_context(&self, headers: &HeaderMap) -> Result<AuthContext>;
}

/// Builds the context from trusted identity headers
///
/// Intended to sit behind a gateway that has already authenticated the
/// caller and forwards `X-User-Id` / `X-User-Roles` / `X-Admin`.
pub struct HeaderAuthProvider;

#[async_trait]
impl AuthProvider for HeaderAuthProvider {
    async fn extract_context(&self, headers: &HeaderMap) -> Result<AuthContext> {
        let header = |name: &str| -> Result<Option<String>> {
            match headers.get(name) {
                Some(v) => Ok(Some(v.to_str()?.trim().to_string())),
                None => Ok(None),
            }
        };

        if let Some(user_id) = header(USER_ID_HEADER)?.filter(|s| !s.is_empty()) {
            let is_admin = header(ADMIN_HEADER)?
                .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));
            if is_admin {
                return Ok(AuthContext::Admin { admin_id: user_id });
            }

            let roles = header(USER_ROLES_HEADER)?
                .map(|raw| {
                    raw.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            return Ok(AuthContext::User { user_id, roles });
        }

        if let Some(service_name) = header(SERVICE_HEADER)?.filter(|s| !s.is_empty()) {
            return Ok(AuthContext::Service { service_name });
        }

        Ok(AuthContext::Anonymous)
    }
}

/// Default no-auth provider (for development)
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn extract_context(&self, _headers: &HeaderMap) -> Result<AuthContext> {
        Ok(AuthContext::Admin {
            admin_id: "1".to_string(),
        })
    }
}
