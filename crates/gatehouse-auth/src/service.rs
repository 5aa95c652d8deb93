//! Sign-in and second-factor flows.
//!
//! [`AuthService`] is the boundary the HTTP layer calls. It drives an account
//! from anonymous to fully trusted:
//!
//! ```text
//! register / login / federated callback
//!         |
//!         +-- second factor disabled --> fully trusted token
//!         |
//!         +-- second factor enabled ---> pending token
//!                                            |
//!                        complete_second_factor_login(code)
//!                                            |
//!                                            v
//!                                    fully trusted token
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let service = AuthService::new(&config, users, roles)?
//!     .with_providers(ProviderRegistry::from_config(&config.federation, exchange))
//!     .with_qr_renderer(Arc::new(TotpQrRenderer));
//!
//! let outcome = service.login("a@x.com", "correct-horse-1").await?;
//! if outcome.requires_second_factor {
//!     let outcome = service.complete_second_factor_login(&outcome.token, "123456").await?;
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{AuthConfig, CookieConfig};
use crate::credential::{hash_password, verify_password, verify_without_account};
use crate::error::AuthError;
use crate::federation::{
    FederatedCallback, FederatedProfile, IdentityLinker, LinkedIdentity, LinkingConfig,
    ProviderRegistry, assign_default_role,
};
use crate::middleware::AuthState;
use crate::second_factor::{QrRenderer, SecondFactorEnrollment, TotpVerifier};
use crate::storage::{RoleStorage, User, UserProfile, UserStorage, normalize_email};
use crate::token::TokenService;

// =============================================================================
// Requests and Outcomes
// =============================================================================

/// Local registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A successful sign-in step.
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    /// The signed-in account.
    pub user: UserProfile,

    /// Session token. Pending when `requires_second_factor` is set.
    pub token: String,

    /// Whether the token must still be exchanged with a one-time code.
    pub requires_second_factor: bool,
}

// =============================================================================
// Auth Service
// =============================================================================

/// Authentication flows over the storage traits.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStorage>,
    roles: Arc<dyn RoleStorage>,
    tokens: Arc<TokenService>,
    totp: TotpVerifier,
    linker: IdentityLinker,
    providers: ProviderRegistry,
    qr: Option<Arc<dyn QrRenderer>>,
    cookie: CookieConfig,
    default_role: String,
    min_password_length: usize,
    pending_exchange_window: Duration,
}

impl AuthService {
    /// Creates a service from configuration.
    ///
    /// No providers and no QR renderer are configured; see
    /// [`with_providers`](Self::with_providers) and
    /// [`with_qr_renderer`](Self::with_qr_renderer).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the token settings are unusable.
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStorage>,
        roles: Arc<dyn RoleStorage>,
    ) -> AuthResult<Self> {
        let tokens = TokenService::new(&config.token)?;
        let linker = IdentityLinker::new(
            Arc::clone(&users),
            Arc::clone(&roles),
            LinkingConfig::new()
                .with_default_role(&config.federation.default_role)
                .with_placeholder_email_domain(&config.federation.placeholder_email_domain),
        );

        Ok(Self {
            users,
            roles,
            tokens: Arc::new(tokens),
            totp: TotpVerifier::new(&config.second_factor),
            linker,
            providers: ProviderRegistry::new(),
            qr: None,
            cookie: config.cookie.clone(),
            default_role: config.federation.default_role.clone(),
            min_password_length: config.password.min_length,
            pending_exchange_window: config.second_factor.pending_exchange_window,
        })
    }

    /// Sets the federated provider registry.
    #[must_use]
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        tracing::info!(providers = ?providers.names(), "Identity providers configured");
        self.providers = providers;
        self
    }

    /// Renders enrollment URIs as QR images.
    #[must_use]
    pub fn with_qr_renderer(mut self, renderer: Arc<dyn QrRenderer>) -> Self {
        self.qr = Some(renderer);
        self
    }

    /// `Set-Cookie` value carrying `token` for the configured token lifetime.
    ///
    /// Returns `None` when cookie authentication is disabled.
    #[must_use]
    pub fn session_cookie(&self, token: &str) -> Option<String> {
        let max_age = i64::try_from(self.tokens.lifetime().as_secs()).unwrap_or(i64::MAX);
        self.cookie.build_cookie(token, max_age)
    }

    /// `Set-Cookie` value that removes the session cookie.
    #[must_use]
    pub fn clear_session_cookie(&self) -> Option<String> {
        self.cookie.build_clear_cookie()
    }

    /// State for the request guards, sharing this service's token verifier.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        AuthState::new(Arc::clone(&self.tokens), Arc::clone(&self.users))
            .with_cookie_config(self.cookie.clone())
    }

    /// Token issuer/verifier.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// One-time code verifier.
    #[must_use]
    pub fn totp(&self) -> &TotpVerifier {
        &self.totp
    }

    // -------------------------------------------------------------------------
    // Local accounts
    // -------------------------------------------------------------------------

    /// Registers a local account and signs it in.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for a missing email or a too-short password
    /// - `DuplicateAccount` if the email is taken
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthOutcome> {
        let email = request.email.trim();
        if email.is_empty() {
            return Err(AuthError::invalid_request("Email is required"));
        }
        if request.password.is_empty() {
            return Err(AuthError::invalid_request("Password is required"));
        }
        if request.password.chars().count() < self.min_password_length {
            return Err(AuthError::invalid_request(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::duplicate_account(normalize_email(email)));
        }

        let user = User::builder(email)
            .password_hash(hash_password(&request.password)?)
            .maybe_name(
                request
                    .name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            )
            .build();
        let user = self.users.create(&user).await?;
        assign_default_role(self.roles.as_ref(), &user, &self.default_role).await?;

        tracing::info!(user_id = %user.id, "Registered local account");
        self.issue_token_for(&user)
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email, an account without
    /// a password, and a wrong password alike.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let user = self.users.find_by_email(email).await?;
        let verified = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => verify_password(hash, password),
            None => verify_without_account(password),
        };

        let user = match user {
            Some(user) if verified => user,
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Login with bad credentials");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::debug!("Login for unknown account");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.issue_token_for(&user)
    }

    // -------------------------------------------------------------------------
    // Federated accounts
    // -------------------------------------------------------------------------

    /// Builds the redirect that starts a federated sign-in.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` for an unknown provider.
    pub fn begin_federated_login(&self, provider: &str, state: &str) -> AuthResult<Url> {
        self.providers.get(provider)?.challenge(state)
    }

    /// Completes a federated sign-in from the provider callback.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` when the provider is unknown or reports an
    /// error, and any storage error from linking.
    pub async fn complete_federated_login(
        &self,
        provider: &str,
        callback: &FederatedCallback,
    ) -> AuthResult<AuthOutcome> {
        let profile = self.providers.get(provider)?.complete(callback).await?;
        let linked = self.link_or_create_identity(&profile).await?;
        self.issue_token_for(&linked.user)
    }

    /// Resolves a verified federated profile to an account.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn link_or_create_identity(
        &self,
        profile: &FederatedProfile,
    ) -> AuthResult<LinkedIdentity> {
        self.linker.link_or_create(profile).await
    }

    // -------------------------------------------------------------------------
    // Second factor
    // -------------------------------------------------------------------------

    /// Starts enrollment: stores a fresh unconfirmed secret.
    ///
    /// Calling it again while pending replaces the secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the second factor is already enabled and
    /// `Unauthorized` for an unknown account.
    pub async fn begin_second_factor_enrollment(
        &self,
        user_id: Uuid,
    ) -> AuthResult<SecondFactorEnrollment> {
        let mut user = self.load_user(user_id).await?;

        let secret = self.totp.generate_secret()?;
        let otpauth_uri = self.totp.enrollment_uri(&secret, &user.email)?;
        user.begin_second_factor(secret.clone())?;
        self.users.update(&user).await?;

        let qr_code = match &self.qr {
            Some(renderer) => Some(renderer.render(&otpauth_uri)?),
            None => None,
        };

        tracing::info!(user_id = %user.id, "Second factor enrollment started");
        Ok(SecondFactorEnrollment {
            secret,
            otpauth_uri,
            qr_code,
        })
    }

    /// Confirms enrollment with a code from the pending secret.
    ///
    /// The caller has already authenticated, so the returned token is fully
    /// trusted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` unless enrollment is pending and
    /// `SecondFactorInvalid` for a wrong code.
    pub async fn confirm_second_factor(&self, user_id: Uuid, code: &str) -> AuthResult<AuthOutcome> {
        let mut user = self.load_user(user_id).await?;

        if user.requires_second_factor() {
            return Err(AuthError::invalid_request("Second factor is already enabled"));
        }
        let secret = user.second_factor_secret.as_deref().ok_or_else(|| {
            AuthError::invalid_request("Second factor enrollment has not been started")
        })?;
        if !self.totp.verify(secret, code) {
            tracing::debug!(user_id = %user.id, "Enrollment code rejected");
            return Err(AuthError::SecondFactorInvalid);
        }

        user.enable_second_factor()?;
        let user = self.users.update(&user).await?;
        tracing::info!(user_id = %user.id, "Second factor enabled");

        self.outcome(&user, true)
    }

    /// Disables the second factor, gated by a valid code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the second factor is not enabled and
    /// `SecondFactorInvalid` for a wrong code.
    pub async fn disable_second_factor(&self, user_id: Uuid, code: &str) -> AuthResult<UserProfile> {
        let mut user = self.load_user(user_id).await?;
        self.check_enabled_code(&user, code)?;

        user.clear_second_factor();
        let user = self.users.update(&user).await?;
        tracing::info!(user_id = %user.id, "Second factor disabled");
        Ok(user.profile())
    }

    /// Exchanges a pending token and a valid code for a fully trusted token.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the token fails verification, is not pending, or
    ///   is older than the exchange window
    /// - `SecondFactorInvalid` for a wrong code
    pub async fn complete_second_factor_login(
        &self,
        pending_token: &str,
        code: &str,
    ) -> AuthResult<AuthOutcome> {
        let claims = self.tokens.verify(pending_token)?;
        if !claims.is_second_factor_pending() {
            return Err(AuthError::invalid_token("Token does not await a second factor"));
        }

        let age = OffsetDateTime::now_utc().unix_timestamp() - claims.iat;
        let window = i64::try_from(self.pending_exchange_window.as_secs()).unwrap_or(i64::MAX);
        if age > window {
            tracing::debug!(sub = %claims.sub, age, "Pending token outside exchange window");
            return Err(AuthError::invalid_token("Second factor exchange window elapsed"));
        }

        let user = self.load_user(claims.user_id()?).await?;
        self.check_enabled_code(&user, code)?;

        tracing::debug!(user_id = %user.id, "Second factor verified");
        self.outcome(&user, true)
    }

    // -------------------------------------------------------------------------
    // Token issuance
    // -------------------------------------------------------------------------

    /// Issues a token after a successful credential check.
    ///
    /// Accounts with the second factor enabled get a pending token; all
    /// others are fully trusted immediately.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue_token_for(&self, user: &User) -> AuthResult<AuthOutcome> {
        self.outcome(user, !user.requires_second_factor())
    }

    fn outcome(&self, user: &User, second_factor_verified: bool) -> AuthResult<AuthOutcome> {
        let token = self
            .tokens
            .issue(user.id, &user.email, second_factor_verified)?;
        Ok(AuthOutcome {
            user: user.profile(),
            token,
            requires_second_factor: !second_factor_verified,
        })
    }

    async fn load_user(&self, user_id: Uuid) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized("User not found"))
    }

    fn check_enabled_code(&self, user: &User, code: &str) -> AuthResult<()> {
        let secret = match (user.requires_second_factor(), &user.second_factor_secret) {
            (true, Some(secret)) => secret,
            _ => return Err(AuthError::invalid_request("Second factor is not enabled")),
        };
        if !self.totp.verify(secret, code) {
            tracing::debug!(user_id = %user.id, "One-time code rejected");
            return Err(AuthError::SecondFactorInvalid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::storage::{Permission, Role, UserWithRoles};

    #[test]
    fn test_new_rejects_unusable_token_config() {
        let config = AuthConfig {
            token: TokenConfig {
                secret: String::new(),
                ..TokenConfig::default()
            },
            ..AuthConfig::default()
        };
        let result = AuthService::new(&config, unreachable_users(), unreachable_roles());
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    fn unreachable_users() -> Arc<dyn UserStorage> {
        Arc::new(Unreachable)
    }

    fn unreachable_roles() -> Arc<dyn RoleStorage> {
        Arc::new(Unreachable)
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl UserStorage for Unreachable {
        async fn find_by_id(&self, _: Uuid) -> AuthResult<Option<User>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn find_by_email(&self, _: &str) -> AuthResult<Option<User>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn find_by_provider_identity(&self, _: &str, _: &str) -> AuthResult<Option<User>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn find_by_email_or_provider_identity(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> AuthResult<Option<User>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn create(&self, _: &User) -> AuthResult<User> {
            Err(AuthError::storage("unreachable"))
        }
        async fn update(&self, _: &User) -> AuthResult<User> {
            Err(AuthError::storage("unreachable"))
        }
        async fn load_with_roles(&self, _: Uuid) -> AuthResult<Option<UserWithRoles>> {
            Err(AuthError::storage("unreachable"))
        }
    }

    #[async_trait::async_trait]
    impl RoleStorage for Unreachable {
        async fn find_role_by_name(&self, _: &str) -> AuthResult<Option<Role>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn list_roles(&self) -> AuthResult<Vec<Role>> {
            Err(AuthError::storage("unreachable"))
        }
        async fn assign_role_to_user(&self, _: Uuid, _: Uuid) -> AuthResult<()> {
            Err(AuthError::storage("unreachable"))
        }
        async fn upsert_role(&self, _: &Role) -> AuthResult<Role> {
            Err(AuthError::storage("unreachable"))
        }
        async fn upsert_permission(
            &self,
            _: &Permission,
        ) -> AuthResult<Permission> {
            Err(AuthError::storage("unreachable"))
        }
        async fn grant_permission(&self, _: Uuid, _: Uuid) -> AuthResult<()> {
            Err(AuthError::storage("unreachable"))
        }
    }

    #[tokio::test]
    async fn test_login_propagates_storage_errors() {
        let config = AuthConfig {
            token: TokenConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                ..TokenConfig::default()
            },
            ..AuthConfig::default()
        };
        let service = AuthService::new(&config, unreachable_users(), unreachable_roles()).unwrap();

        let result = service.login("a@x.com", "correct-horse-1").await;
        assert!(matches!(result, Err(AuthError::Storage { .. })));
    }
}
