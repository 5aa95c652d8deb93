//! Role storage trait.
//!
//! Roles group permissions; accounts hold roles. Both junctions are sets:
//! a role is granted a permission at most once and an account holds a role
//! at most once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthResult;

// =============================================================================
// Permission
// =============================================================================

/// A named capability such as `users:read`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Unique identifier for the permission.
    pub id: Uuid,

    /// Unique name, conventionally `resource:action`.
    pub name: String,

    /// Description of what the permission allows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    /// Create a new permission with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =============================================================================
// Role Type
// =============================================================================

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier for the role.
    pub id: Uuid,

    /// Unique name (e.g., "admin", "user").
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Role {
    /// Create a new role with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A role held by an account, with the names of the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Role name.
    pub role: String,
    /// Permission names granted by the role.
    pub permissions: Vec<String>,
}

impl RoleGrant {
    /// Creates a grant.
    #[must_use]
    pub fn new<I, S>(role: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role: role.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

// =============================================================================
// Role Storage Trait
// =============================================================================

/// Storage operations for roles, permissions and their assignments.
#[async_trait]
pub trait RoleStorage: Send + Sync {
    /// Find a role by name.
    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>>;

    /// List all roles.
    async fn list_roles(&self) -> AuthResult<Vec<Role>>;

    /// Give an account a role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Conflict` if the account already holds the role,
    /// and `AuthError::InvalidRequest` if either side does not exist.
    async fn assign_role_to_user(&self, user_id: Uuid, role_id: Uuid) -> AuthResult<()>;

    /// Insert a role, or return the existing role with the same name.
    async fn upsert_role(&self, role: &Role) -> AuthResult<Role>;

    /// Insert a permission, or return the existing permission with the same name.
    async fn upsert_permission(&self, permission: &Permission) -> AuthResult<Permission>;

    /// Grant a permission to a role. Granting twice is a no-op.
    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> AuthResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_builder() {
        let role = Role::new("moderator").with_description("Can edit users");
        assert_eq!(role.name, "moderator");
        assert_eq!(role.description.as_deref(), Some("Can edit users"));
    }

    #[test]
    fn test_role_grant_new() {
        let grant = RoleGrant::new("user", ["users:read"]);
        assert_eq!(grant.role, "user");
        assert_eq!(grant.permissions, vec!["users:read".to_string()]);
    }
}
