//! User storage trait.
//!
//! Defines the interface for account persistence operations.
//! Implementations are provided by storage backends (e.g. the in-memory
//! backend in `gatehouse-auth-memory`).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::second_factor::SecondFactorStatus;

use super::role::RoleGrant;

/// Origin provider value of accounts created by registration.
pub const LOCAL_PROVIDER: &str = "local";

/// Normalizes an email for storage and lookup: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Account Origin
// =============================================================================

/// Where an account was first created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountOrigin {
    /// Email/password registration.
    Local,
    /// A named federated provider, e.g. "github".
    Federated(String),
}

impl AccountOrigin {
    /// Returns the provider name as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => LOCAL_PROVIDER,
            Self::Federated(name) => name,
        }
    }
}

impl From<String> for AccountOrigin {
    fn from(value: String) -> Self {
        if value == LOCAL_PROVIDER {
            Self::Local
        } else {
            Self::Federated(value)
        }
    }
}

impl From<AccountOrigin> for String {
    fn from(value: AccountOrigin) -> Self {
        match value {
            AccountOrigin::Local => LOCAL_PROVIDER.to_string(),
            AccountOrigin::Federated(name) => name,
        }
    }
}

impl fmt::Display for AccountOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User Type
// =============================================================================

/// An account.
///
/// Contains the password hash and second-factor secret; never hand it to a
/// client directly, use [`UserProfile`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,

    /// Normalized email; unique across accounts.
    pub email: String,

    /// Argon2 PHC hash; `None` for federated-only accounts.
    #[serde(default)]
    pub password_hash: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,

    /// Where the account was created or most recently linked.
    pub provider: AccountOrigin,

    /// External id at `provider`; `None` until a federated identity is linked.
    #[serde(default)]
    pub provider_id: Option<String>,

    /// Base32 TOTP secret; present while pending or enabled.
    #[serde(default)]
    pub second_factor_secret: Option<String>,

    /// Whether sign-in requires a one-time code.
    #[serde(default)]
    pub second_factor_enabled: bool,

    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the account was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Creates a local account with the given email.
    ///
    /// The email is normalized and a new UUID is generated as the ID.
    #[must_use]
    pub fn new(email: impl AsRef<str>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email.as_ref()),
            password_hash: None,
            name: None,
            avatar: None,
            provider: AccountOrigin::Local,
            provider_id: None,
            second_factor_secret: None,
            second_factor_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a new user builder.
    #[must_use]
    pub fn builder(email: impl AsRef<str>) -> UserBuilder {
        UserBuilder::new(email)
    }

    /// Current second-factor state.
    #[must_use]
    pub fn second_factor_status(&self) -> SecondFactorStatus {
        match (self.second_factor_enabled, &self.second_factor_secret) {
            (true, Some(_)) => SecondFactorStatus::Enabled,
            (false, Some(_)) => SecondFactorStatus::Pending,
            // An enabled flag without a secret cannot verify anything.
            (_, None) => SecondFactorStatus::Disabled,
        }
    }

    /// Stores a fresh unconfirmed secret (Disabled/Pending -> Pending).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the second factor is already enabled.
    pub fn begin_second_factor(&mut self, secret: String) -> AuthResult<()> {
        if self.second_factor_status() == SecondFactorStatus::Enabled {
            return Err(AuthError::invalid_request(
                "Second factor is already enabled",
            ));
        }
        self.second_factor_secret = Some(secret);
        self.second_factor_enabled = false;
        self.touch();
        Ok(())
    }

    /// Marks the pending secret as confirmed (Pending -> Enabled).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` unless the account is pending.
    pub fn enable_second_factor(&mut self) -> AuthResult<()> {
        match self.second_factor_status() {
            SecondFactorStatus::Pending => {
                self.second_factor_enabled = true;
                self.touch();
                Ok(())
            }
            SecondFactorStatus::Enabled => Err(AuthError::invalid_request(
                "Second factor is already enabled",
            )),
            SecondFactorStatus::Disabled => Err(AuthError::invalid_request(
                "Second factor enrollment has not been started",
            )),
        }
    }

    /// Clears the secret and the enabled flag (Enabled -> Disabled).
    pub fn clear_second_factor(&mut self) {
        self.second_factor_secret = None;
        self.second_factor_enabled = false;
        self.touch();
    }

    /// Returns `true` if issued tokens must await a one-time code.
    #[must_use]
    pub fn requires_second_factor(&self) -> bool {
        self.second_factor_status() == SecondFactorStatus::Enabled
    }

    /// Sanitized projection safe to return to clients.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            provider: self.provider.to_string(),
            second_factor_enabled: self.requires_second_factor(),
        }
    }

    /// Bumps `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Client-facing view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account id.
    pub id: Uuid,
    /// Email.
    pub email: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Origin provider.
    pub provider: String,
    /// Whether sign-in requires a one-time code.
    pub second_factor_enabled: bool,
}

// =============================================================================
// User Builder
// =============================================================================

/// Builder for creating `User` instances.
pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    fn new(email: impl AsRef<str>) -> Self {
        Self {
            user: User::new(email),
        }
    }

    /// Sets the user ID.
    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.user.id = id;
        self
    }

    /// Sets the password hash.
    #[must_use]
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.user.password_hash = Some(hash.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.user.name = Some(name.into());
        self
    }

    /// Sets the display name if present.
    #[must_use]
    pub fn maybe_name(mut self, name: Option<String>) -> Self {
        self.user.name = name;
        self
    }

    /// Sets the avatar URL if present.
    #[must_use]
    pub fn maybe_avatar(mut self, avatar: Option<String>) -> Self {
        self.user.avatar = avatar;
        self
    }

    /// Marks the account as created through a federated provider.
    #[must_use]
    pub fn federated(mut self, provider: impl Into<String>, external_id: impl Into<String>) -> Self {
        self.user.provider = AccountOrigin::Federated(provider.into());
        self.user.provider_id = Some(external_id.into());
        self
    }

    /// Builds the user.
    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}

/// An account together with its role grants.
#[derive(Debug, Clone)]
pub struct UserWithRoles {
    /// The account.
    pub user: User,
    /// Every role the account holds, with each role's permissions.
    pub roles: Vec<RoleGrant>,
}

// =============================================================================
// User Storage Trait
// =============================================================================

/// Storage operations for accounts.
///
/// Lookups by email are case-insensitive; implementations normalize with
/// [`normalize_email`].
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Find an account by id.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Find an account by email.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Find an account linked to `external_id` at `provider`.
    async fn find_by_provider_identity(
        &self,
        provider: &str,
        external_id: &str,
    ) -> AuthResult<Option<User>>;

    /// Find the first account matching either the provider identity or the email.
    ///
    /// A single lookup so identity linking does not race between two reads.
    /// When both predicates match different accounts the provider identity wins.
    async fn find_by_email_or_provider_identity(
        &self,
        email: &str,
        provider: &str,
        external_id: &str,
    ) -> AuthResult<Option<User>>;

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateAccount` if the email is taken, and
    /// `AuthError::Conflict` if the provider identity is already linked.
    async fn create(&self, user: &User) -> AuthResult<User>;

    /// Replace a stored account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` if the account does not exist and the
    /// same uniqueness errors as [`UserStorage::create`].
    async fn update(&self, user: &User) -> AuthResult<User>;

    /// Load an account together with its roles and each role's permissions.
    async fn load_with_roles(&self, id: Uuid) -> AuthResult<Option<UserWithRoles>>;
}
