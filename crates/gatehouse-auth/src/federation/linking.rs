//! Identity linking for federated sign-in.
//!
//! Given a [`FederatedProfile`], exactly one of three things happens:
//!
//! 1. **Create** - no account matches the provider identity or the email:
//!    create one and give it the default role.
//! 2. **Link** - an account matches but has no federated identity yet:
//!    attach this one and backfill name and avatar where empty.
//! 3. **Existing** - an account matches and is already linked: use it as is.
//!
//! Two concurrent first sign-ins for the same identity race on create; the
//! loser sees `DuplicateAccount` and retries through the lookup path.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{AccountOrigin, RoleStorage, User, UserStorage};

use super::profile::FederatedProfile;

/// Configuration for identity linking.
#[derive(Debug, Clone)]
pub struct LinkingConfig {
    /// Role given to newly created accounts.
    pub default_role: String,

    /// Domain used to synthesize an email when the profile has none.
    pub placeholder_email_domain: String,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            default_role: "user".to_string(),
            placeholder_email_domain: "oauth.invalid".to_string(),
        }
    }
}

impl LinkingConfig {
    /// Creates a new linking configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default role for new accounts.
    #[must_use]
    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    /// Sets the placeholder email domain.
    #[must_use]
    pub fn with_placeholder_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.placeholder_email_domain = domain.into();
        self
    }
}

/// The action taken while linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// A new account was created.
    Created,
    /// The identity was attached to an existing account.
    Linked,
    /// An already-linked account was returned unchanged.
    Existing,
}

impl LinkAction {
    /// Returns the action as a string for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Linked => "linked",
            Self::Existing => "existing",
        }
    }
}

/// Result of linking a federated identity.
#[derive(Debug, Clone)]
pub struct LinkedIdentity {
    /// The account the identity resolved to.
    pub user: User,
    /// What happened.
    pub action: LinkAction,
}

/// Resolves federated profiles to accounts.
#[derive(Clone)]
pub struct IdentityLinker {
    users: Arc<dyn UserStorage>,
    roles: Arc<dyn RoleStorage>,
    config: LinkingConfig,
}

impl IdentityLinker {
    /// Creates a linker.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStorage>,
        roles: Arc<dyn RoleStorage>,
        config: LinkingConfig,
    ) -> Self {
        Self {
            users,
            roles,
            config,
        }
    }

    /// Resolves `profile` to an account, creating or linking as needed.
    ///
    /// # Errors
    ///
    /// Propagates storage errors. A lost create race that still finds no
    /// account on retry is reported as `AuthError::Conflict`.
    pub async fn link_or_create(&self, profile: &FederatedProfile) -> AuthResult<LinkedIdentity> {
        let email = profile.email_or_placeholder(&self.config.placeholder_email_domain);

        if let Some(user) = self.lookup(profile, &email).await? {
            return self.attach(user, profile).await;
        }

        match self.create(profile, &email).await {
            Ok(user) => Ok(LinkedIdentity {
                user,
                action: LinkAction::Created,
            }),
            Err(AuthError::DuplicateAccount { .. }) => {
                tracing::debug!(
                    provider = %profile.provider(),
                    "Account created concurrently, retrying as link"
                );
                let user = self.lookup(profile, &email).await?.ok_or_else(|| {
                    AuthError::conflict("account disappeared after a duplicate create")
                })?;
                self.attach(user, profile).await
            }
            Err(e) => Err(e),
        }
    }

    async fn lookup(&self, profile: &FederatedProfile, email: &str) -> AuthResult<Option<User>> {
        self.users
            .find_by_email_or_provider_identity(email, profile.provider(), profile.external_id())
            .await
    }

    async fn attach(&self, mut user: User, profile: &FederatedProfile) -> AuthResult<LinkedIdentity> {
        if user.provider_id.is_some() {
            tracing::debug!(
                user_id = %user.id,
                provider = %profile.provider(),
                "Federated sign-in to linked account"
            );
            return Ok(LinkedIdentity {
                user,
                action: LinkAction::Existing,
            });
        }

        user.provider = AccountOrigin::Federated(profile.provider().to_string());
        user.provider_id = Some(profile.external_id().to_string());
        if user.name.is_none() {
            user.name = profile.display_name().map(ToString::to_string);
        }
        if user.avatar.is_none() {
            user.avatar = profile.avatar_url().map(ToString::to_string);
        }
        user.touch();

        let user = self.users.update(&user).await?;
        tracing::info!(
            user_id = %user.id,
            provider = %profile.provider(),
            action = LinkAction::Linked.as_str(),
            "Linked federated identity"
        );
        Ok(LinkedIdentity {
            user,
            action: LinkAction::Linked,
        })
    }

    async fn create(&self, profile: &FederatedProfile, email: &str) -> AuthResult<User> {
        let user = User::builder(email)
            .federated(profile.provider(), profile.external_id())
            .maybe_name(profile.display_name().map(ToString::to_string))
            .maybe_avatar(profile.avatar_url().map(ToString::to_string))
            .build();

        let user = self.users.create(&user).await?;
        assign_default_role(self.roles.as_ref(), &user, &self.config.default_role).await?;

        tracing::info!(
            user_id = %user.id,
            provider = %profile.provider(),
            action = LinkAction::Created.as_str(),
            "Created account from federated identity"
        );
        Ok(user)
    }
}

/// Gives a freshly created account the default role.
///
/// A missing role is logged and skipped so sign-up never fails on seed data.
pub(crate) async fn assign_default_role(
    roles: &dyn RoleStorage,
    user: &User,
    role_name: &str,
) -> AuthResult<()> {
    match roles.find_role_by_name(role_name).await? {
        Some(role) => match roles.assign_role_to_user(user.id, role.id).await {
            Ok(()) | Err(AuthError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e),
        },
        None => {
            tracing::warn!(
                user_id = %user.id,
                role = %role_name,
                "Default role is missing; account created without roles"
            );
            Ok(())
        }
    }
}
