//! Role-based access resolution.
//!
//! Access is recomputed from storage on every request, so role changes take
//! effect immediately without touching issued tokens.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::AuthResult;
use crate::storage::{RoleGrant, User, UserStorage};

/// The roles and flattened permissions of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedAccess {
    /// Role names in storage order.
    pub roles: Vec<String>,
    /// Union of every role's permissions.
    pub permissions: BTreeSet<String>,
}

impl ResolvedAccess {
    /// Flattens role grants. Permissions shared by several roles appear once.
    #[must_use]
    pub fn from_grants(grants: &[RoleGrant]) -> Self {
        Self {
            roles: grants.iter().map(|grant| grant.role.clone()).collect(),
            permissions: grants
                .iter()
                .flat_map(|grant| grant.permissions.iter().cloned())
                .collect(),
        }
    }

    /// Returns `true` if the account holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns `true` if any role grants `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Returns `true` if at least one of `roles` is held.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }

    /// Returns `true` if at least one of `permissions` is granted.
    #[must_use]
    pub fn has_any_permission<S: AsRef<str>>(&self, permissions: &[S]) -> bool {
        permissions
            .iter()
            .any(|permission| self.has_permission(permission.as_ref()))
    }
}

/// Loads an account's roles and resolves its permission set.
#[derive(Clone)]
pub struct PermissionResolver {
    users: Arc<dyn UserStorage>,
}

impl PermissionResolver {
    /// Creates a resolver over `users`.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self { users }
    }

    /// Loads the account and its access in one storage round trip.
    ///
    /// Returns `None` if the account does not exist.
    pub async fn resolve_user(&self, user_id: Uuid) -> AuthResult<Option<(User, ResolvedAccess)>> {
        let Some(loaded) = self.users.load_with_roles(user_id).await? else {
            return Ok(None);
        };

        let access = ResolvedAccess::from_grants(&loaded.roles);
        tracing::debug!(
            user_id = %user_id,
            roles = ?access.roles,
            permissions = access.permissions.len(),
            "Resolved access"
        );
        Ok(Some((loaded.user, access)))
    }

    /// Resolves access only. A missing account resolves to no access.
    pub async fn resolve(&self, user_id: Uuid) -> AuthResult<ResolvedAccess> {
        Ok(self
            .resolve_user(user_id)
            .await?
            .map(|(_, access)| access)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_deduplicates() {
        let access = ResolvedAccess::from_grants(&[
            RoleGrant::new("user", ["users:read"]),
            RoleGrant::new("moderator", ["users:read", "users:write"]),
        ]);

        assert_eq!(access.roles, vec!["user", "moderator"]);
        assert_eq!(access.permissions.len(), 2);
        assert!(access.has_permission("users:read"));
        assert!(access.has_permission("users:write"));
        assert!(!access.has_permission("admin"));
    }

    #[test]
    fn test_no_roles_no_permissions() {
        let access = ResolvedAccess::from_grants(&[]);
        assert!(access.roles.is_empty());
        assert!(access.permissions.is_empty());
        assert!(!access.has_any_permission(&["users:read"]));
    }

    #[test]
    fn test_any_of_semantics() {
        let access = ResolvedAccess::from_grants(&[RoleGrant::new("admin", ["admin"])]);
        assert!(access.has_any_role(&["moderator", "admin"]));
        assert!(!access.has_any_role(&["moderator"]));
        assert!(access.has_any_permission(&["users:read", "admin"]));
        assert!(!access.has_any_permission::<&str>(&[]));
    }
}
