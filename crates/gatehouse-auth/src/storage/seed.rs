//! Reference roles and permissions.
//!
//! `seed_defaults` installs the baseline access model. Running it again
//! changes nothing.

use crate::AuthResult;

use super::role::{Permission, Role, RoleStorage};

/// Permissions installed by [`seed_defaults`], with descriptions.
pub const DEFAULT_PERMISSIONS: &[(&str, &str)] = &[
    ("users:read", "Read user data"),
    ("users:write", "Create and update users"),
    ("users:delete", "Delete users"),
    ("admin", "Full administrative access"),
];

/// Roles installed by [`seed_defaults`] and the permissions each grants.
pub const DEFAULT_ROLES: &[(&str, &str, &[&str])] = &[
    ("admin", "Administrator", &["admin"]),
    ("user", "Regular user", &["users:read"]),
    ("moderator", "Moderator", &["users:read", "users:write"]),
];

/// Installs the default roles, permissions and grants.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn seed_defaults(storage: &dyn RoleStorage) -> AuthResult<()> {
    let mut permissions = Vec::with_capacity(DEFAULT_PERMISSIONS.len());
    for (name, description) in DEFAULT_PERMISSIONS {
        let permission = storage
            .upsert_permission(&Permission::new(*name).with_description(*description))
            .await?;
        permissions.push(permission);
    }

    for (name, description, granted) in DEFAULT_ROLES {
        let role = storage
            .upsert_role(&Role::new(*name).with_description(*description))
            .await?;
        for permission in permissions.iter().filter(|p| granted.contains(&p.name.as_str())) {
            storage.grant_permission(role.id, permission.id).await?;
        }
    }

    tracing::info!(
        roles = DEFAULT_ROLES.len(),
        permissions = DEFAULT_PERMISSIONS.len(),
        "Default roles seeded"
    );
    Ok(())
}
