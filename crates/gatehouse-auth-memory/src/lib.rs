//! In-memory storage backend for Gatehouse authentication.
//!
//! This crate provides [`InMemoryAuthStorage`], an implementation of the
//! `UserStorage` and `RoleStorage` traits from `gatehouse-auth` that keeps
//! every row in process memory behind a single `tokio::sync::RwLock`.
//!
//! Unique indexes mirror the constraints a relational backend would declare:
//! account email, provider identity, role name, permission name, and both
//! junction pairs. Every mutating operation checks and writes under one write
//! lock, so concurrent creates for the same email serialize and the loser
//! sees `DuplicateAccount`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gatehouse_auth::{AuthConfig, AuthService};
//! use gatehouse_auth_memory::InMemoryAuthStorage;
//!
//! let storage = Arc::new(InMemoryAuthStorage::seeded().await?);
//! let service = AuthService::new(&config, storage.clone(), storage)?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_auth::storage::{
    Permission, Role, RoleGrant, RoleStorage, User, UserStorage, UserWithRoles, normalize_email,
    seed_defaults,
};
use gatehouse_auth::{AuthError, AuthResult};
use tokio::sync::RwLock;
use uuid::Uuid;

type IdentityKey = (String, String);

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    identities: HashMap<IdentityKey, Uuid>,
    roles: HashMap<Uuid, Role>,
    role_names: HashMap<String, Uuid>,
    permissions: HashMap<Uuid, Permission>,
    permission_names: HashMap<String, Uuid>,
    role_permissions: BTreeSet<(Uuid, Uuid)>,
    user_roles: BTreeSet<(Uuid, Uuid)>,
}

impl State {
    fn identity_key(user: &User) -> Option<IdentityKey> {
        user.provider_id
            .as_ref()
            .map(|id| (user.provider.as_str().to_ascii_lowercase(), id.clone()))
    }

    /// Checks the unique indexes for `user` as if it replaced the row with
    /// the same id.
    fn check_unique(&self, user: &User, email: &str) -> AuthResult<()> {
        if let Some(owner) = self.emails.get(email)
            && *owner != user.id
        {
            return Err(AuthError::duplicate_account(email));
        }
        if let Some(key) = Self::identity_key(user)
            && let Some(owner) = self.identities.get(&key)
            && *owner != user.id
        {
            return Err(AuthError::conflict(format!(
                "identity {}:{} is linked to another account",
                key.0, key.1
            )));
        }
        Ok(())
    }

    fn insert_user(&mut self, mut user: User, email: String) -> User {
        if let Some(key) = Self::identity_key(&user) {
            self.identities.insert(key, user.id);
        }
        self.emails.insert(email.clone(), user.id);
        user.email = email;
        self.users.insert(user.id, user.clone());
        user
    }

    fn remove_indexes(&mut self, user: &User) {
        self.emails.remove(&user.email);
        if let Some(key) = Self::identity_key(user) {
            self.identities.remove(&key);
        }
    }

    fn grants_for(&self, user_id: Uuid) -> Vec<RoleGrant> {
        let mut grants: Vec<RoleGrant> = self
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, role_id)| self.roles.get(role_id))
            .map(|role| {
                let permissions = self
                    .role_permissions
                    .iter()
                    .filter(|(rid, _)| *rid == role.id)
                    .filter_map(|(_, pid)| self.permissions.get(pid))
                    .map(|p| p.name.clone());
                RoleGrant::new(role.name.clone(), permissions)
            })
            .collect();
        grants.sort_by(|a, b| a.role.cmp(&b.role));
        grants
    }
}

/// In-memory account, role and permission storage.
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthStorage {
    state: Arc<RwLock<State>>,
}

impl InMemoryAuthStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the default roles and permissions.
    ///
    /// # Errors
    ///
    /// Propagates seeding errors.
    pub async fn seeded() -> AuthResult<Self> {
        let storage = Self::new();
        seed_defaults(&storage).await?;
        Ok(storage)
    }

    /// Number of stored accounts.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl UserStorage for InMemoryAuthStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .get(&normalize_email(email))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_provider_identity(
        &self,
        provider: &str,
        external_id: &str,
    ) -> AuthResult<Option<User>> {
        let state = self.state.read().await;
        let key = (provider.to_ascii_lowercase(), external_id.to_string());
        Ok(state
            .identities
            .get(&key)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_email_or_provider_identity(
        &self,
        email: &str,
        provider: &str,
        external_id: &str,
    ) -> AuthResult<Option<User>> {
        let state = self.state.read().await;
        let key = (provider.to_ascii_lowercase(), external_id.to_string());
        let id = state
            .identities
            .get(&key)
            .or_else(|| state.emails.get(&normalize_email(email)));
        Ok(id.and_then(|id| state.users.get(id)).cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<User> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(AuthError::conflict(format!("account {} already exists", user.id)));
        }

        let email = normalize_email(&user.email);
        state.check_unique(user, &email)?;

        let created = state.insert_user(user.clone(), email);
        tracing::debug!(user_id = %created.id, "Stored account");
        Ok(created)
    }

    async fn update(&self, user: &User) -> AuthResult<User> {
        let mut state = self.state.write().await;
        let Some(existing) = state.users.get(&user.id).cloned() else {
            return Err(AuthError::unauthorized("User not found"));
        };

        let email = normalize_email(&user.email);
        state.check_unique(user, &email)?;

        state.remove_indexes(&existing);
        Ok(state.insert_user(user.clone(), email))
    }

    async fn load_with_roles(&self, id: Uuid) -> AuthResult<Option<UserWithRoles>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|user| UserWithRoles {
            user: user.clone(),
            roles: state.grants_for(id),
        }))
    }
}

#[async_trait]
impl RoleStorage for InMemoryAuthStorage {
    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .role_names
            .get(name)
            .and_then(|id| state.roles.get(id))
            .cloned())
    }

    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn assign_role_to_user(&self, user_id: Uuid, role_id: Uuid) -> AuthResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(AuthError::invalid_request(format!("unknown account {user_id}")));
        }
        if !state.roles.contains_key(&role_id) {
            return Err(AuthError::invalid_request(format!("unknown role {role_id}")));
        }
        if !state.user_roles.insert((user_id, role_id)) {
            return Err(AuthError::conflict("account already holds this role"));
        }
        tracing::debug!(user_id = %user_id, role_id = %role_id, "Assigned role");
        Ok(())
    }

    async fn upsert_role(&self, role: &Role) -> AuthResult<Role> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.role_names.get(&role.name).and_then(|id| state.roles.get(id)) {
            return Ok(existing.clone());
        }
        state.role_names.insert(role.name.clone(), role.id);
        state.roles.insert(role.id, role.clone());
        Ok(role.clone())
    }

    async fn upsert_permission(&self, permission: &Permission) -> AuthResult<Permission> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .permission_names
            .get(&permission.name)
            .and_then(|id| state.permissions.get(id))
        {
            return Ok(existing.clone());
        }
        state
            .permission_names
            .insert(permission.name.clone(), permission.id);
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission.clone())
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> AuthResult<()> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role_id) {
            return Err(AuthError::invalid_request(format!("unknown role {role_id}")));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(AuthError::invalid_request(format!(
                "unknown permission {permission_id}"
            )));
        }
        state.role_permissions.insert((role_id, permission_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_email_is_unique_case_insensitively() {
        let storage = InMemoryAuthStorage::new();
        storage.create(&User::new("a@x.com")).await.unwrap();

        let err = storage.create(&User::new("A@X.COM")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount { ref email } if email == "a@x.com"));
        assert!(storage.find_by_email(" A@x.com ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provider_identity_is_unique() {
        let storage = InMemoryAuthStorage::new();
        let first = User::builder("one@x.com").federated("github", "7").build();
        storage.create(&first).await.unwrap();

        let second = User::builder("two@x.com").federated("github", "7").build();
        assert!(matches!(
            storage.create(&second).await,
            Err(AuthError::Conflict { .. })
        ));

        let found = storage
            .find_by_provider_identity("GitHub", "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_combined_lookup_prefers_provider_identity() {
        let storage = InMemoryAuthStorage::new();
        let local = storage.create(&User::new("shared@x.com")).await.unwrap();
        let linked = storage
            .create(&User::builder("other@x.com").federated("google", "g-1").build())
            .await
            .unwrap();

        let found = storage
            .find_by_email_or_provider_identity("shared@x.com", "google", "g-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, linked.id);

        let found = storage
            .find_by_email_or_provider_identity("shared@x.com", "google", "g-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, local.id);
    }

    #[tokio::test]
    async fn test_update_reindexes() {
        let storage = InMemoryAuthStorage::new();
        let mut user = storage.create(&User::new("old@x.com")).await.unwrap();

        user.email = "new@x.com".to_string();
        user.provider_id = Some("99".to_string());
        user.provider = "github".to_string().into();
        storage.update(&user).await.unwrap();

        assert!(storage.find_by_email("old@x.com").await.unwrap().is_none());
        assert!(storage.find_by_email("new@x.com").await.unwrap().is_some());
        assert!(
            storage
                .find_by_provider_identity("github", "99")
                .await
                .unwrap()
                .is_some()
        );
        // The freed email can be taken again.
        assert!(storage.create(&User::new("old@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let storage = InMemoryAuthStorage::new();
        assert!(matches!(
            storage.update(&User::new("ghost@x.com")).await,
            Err(AuthError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_seeded_roles_and_duplicate_assignment() {
        let storage = InMemoryAuthStorage::seeded().await.unwrap();
        seed_defaults(&storage).await.unwrap();

        let names: Vec<String> = storage
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["admin", "moderator", "user"]);

        let user = storage.create(&User::new("m@x.com")).await.unwrap();
        let moderator = storage.find_role_by_name("moderator").await.unwrap().unwrap();
        storage.assign_role_to_user(user.id, moderator.id).await.unwrap();
        assert!(matches!(
            storage.assign_role_to_user(user.id, moderator.id).await,
            Err(AuthError::Conflict { .. })
        ));

        let loaded = storage.load_with_roles(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.roles.len(), 1);
        assert_eq!(loaded.roles[0].role, "moderator");
        let mut permissions = loaded.roles[0].permissions.clone();
        permissions.sort();
        assert_eq!(permissions, vec!["users:read", "users:write"]);
    }

    #[tokio::test]
    async fn test_assign_unknown_role() {
        let storage = InMemoryAuthStorage::new();
        let user = storage.create(&User::new("u@x.com")).await.unwrap();
        assert!(matches!(
            storage.assign_role_to_user(user.id, Uuid::new_v4()).await,
            Err(AuthError::InvalidRequest { .. })
        ));
    }
}
