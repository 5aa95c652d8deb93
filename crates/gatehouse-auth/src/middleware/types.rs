//! Authenticated request identity.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::rbac::ResolvedAccess;
use crate::storage::User;

/// Who is making the request and what they may do.
///
/// Produced by the authentication guard and passed to handlers explicitly,
/// either as an extractor value or through request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestIdentity {
    /// Account id.
    pub user_id: Uuid,

    /// Account email.
    pub email: String,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Whether the account has the second factor enabled.
    pub second_factor_enabled: bool,

    /// Role names.
    pub roles: Vec<String>,

    /// Flattened permission names.
    pub permissions: BTreeSet<String>,
}

impl RequestIdentity {
    /// Builds an identity from a freshly loaded account and its access.
    #[must_use]
    pub fn new(user: &User, access: ResolvedAccess) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            second_factor_enabled: user.requires_second_factor(),
            roles: access.roles,
            permissions: access.permissions,
        }
    }

    /// Returns `true` if the identity holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns `true` if the identity is granted `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Succeeds if at least one of `required` is granted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InsufficientPermission` carrying `required`.
    pub fn require_any_permission<S: AsRef<str>>(&self, required: &[S]) -> AuthResult<()> {
        if required.iter().any(|p| self.has_permission(p.as_ref())) {
            return Ok(());
        }
        tracing::debug!(
            user_id = %self.user_id,
            permissions = ?self.permissions,
            "Access denied: missing permission"
        );
        Err(AuthError::insufficient_permission(
            required.iter().map(|p| p.as_ref().to_string()),
        ))
    }

    /// Succeeds if at least one of `required` is held.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InsufficientRole` carrying `required`.
    pub fn require_any_role<S: AsRef<str>>(&self, required: &[S]) -> AuthResult<()> {
        if required.iter().any(|r| self.has_role(r.as_ref())) {
            return Ok(());
        }
        tracing::debug!(
            user_id = %self.user_id,
            roles = ?self.roles,
            "Access denied: missing role"
        );
        Err(AuthError::insufficient_role(
            required.iter().map(|r| r.as_ref().to_string()),
        ))
    }
}
