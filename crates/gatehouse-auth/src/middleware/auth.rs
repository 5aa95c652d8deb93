//! Request authentication.
//!
//! Tokens are read from the `Authorization: Bearer <token>` header first and
//! then from the session cookie. A request is authenticated when the token
//! verifies, does not await a second factor, and its subject still exists.
//! Roles and permissions are loaded fresh for every request.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use gatehouse_auth::middleware::{AuthState, Authenticated};
//!
//! async fn me(Authenticated(identity): Authenticated) -> String {
//!     format!("Hello, {}!", identity.email)
//! }
//!
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .with_state(auth_state);
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use cookie::Cookie;

use crate::AuthResult;
use crate::config::CookieConfig;
use crate::error::AuthError;
use crate::rbac::PermissionResolver;
use crate::storage::UserStorage;
use crate::token::TokenService;

use super::types::RequestIdentity;

// =============================================================================
// Auth State
// =============================================================================

/// State required by the authentication guards.
///
/// Include it in your application state and expose it via `FromRef`.
///
/// ```ignore
/// #[derive(Clone)]
/// struct AppState {
///     auth: AuthState,
/// }
///
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthState {
    /// Token verification.
    pub tokens: Arc<TokenService>,

    /// Per-request role and permission resolution.
    pub resolver: PermissionResolver,

    /// Cookie configuration for browser-based auth.
    pub cookie_config: CookieConfig,
}

impl AuthState {
    /// Creates a new auth state with the default cookie configuration.
    pub fn new(tokens: Arc<TokenService>, users: Arc<dyn UserStorage>) -> Self {
        Self {
            tokens,
            resolver: PermissionResolver::new(users),
            cookie_config: CookieConfig::default(),
        }
    }

    /// Sets cookie configuration for browser-based authentication.
    #[must_use]
    pub fn with_cookie_config(mut self, cookie_config: CookieConfig) -> Self {
        self.cookie_config = cookie_config;
        self
    }

    /// Finds the presented token, if any.
    #[must_use]
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        extract_bearer_token(headers)
            .or_else(|| extract_token_from_cookie(headers, &self.cookie_config))
    }

    /// Authenticates a request.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` when no token is presented or its account is gone
    /// - `InvalidToken` when the token fails verification
    /// - `SecondFactorRequired` when the token explicitly awaits a code
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<RequestIdentity> {
        let token = self
            .extract_token(headers)
            .ok_or_else(|| AuthError::unauthorized("No token provided"))?;

        let claims = self.tokens.verify(&token)?;
        if claims.is_second_factor_pending() {
            tracing::debug!(sub = %claims.sub, "Token awaits second factor");
            return Err(AuthError::SecondFactorRequired);
        }

        let user_id = claims.user_id()?;
        let (user, access) = self
            .resolver
            .resolve_user(user_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Token subject no longer exists");
                AuthError::unauthorized("User not found")
            })?;

        let identity = RequestIdentity::new(&user, access);
        tracing::debug!(
            user_id = %identity.user_id,
            roles = ?identity.roles,
            "Request authenticated"
        );
        Ok(identity)
    }

    /// Authenticates when possible; never fails.
    ///
    /// Missing, invalid and second-factor-pending tokens all yield `None`.
    /// Infrastructure failures are logged and also yield `None`.
    pub async fn authenticate_optional(&self, headers: &HeaderMap) -> Option<RequestIdentity> {
        self.extract_token(headers)?;

        match self.authenticate(headers).await {
            Ok(identity) => Some(identity),
            Err(e) if e.is_server_error() => {
                tracing::warn!(error = %e, "Optional authentication failed");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Proceeding unauthenticated");
                None
            }
        }
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Axum extractor for a mandatory authenticated identity.
///
/// Reuses the identity placed in request extensions by
/// [`require_authentication`](super::guard::require_authentication) when
/// present; otherwise authenticates the request itself.
///
/// # Errors
///
/// Rejects with the [`AuthError`] from [`AuthState::authenticate`].
pub struct Authenticated(pub RequestIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<RequestIdentity>() {
            return Ok(Self(identity.clone()));
        }

        let auth_state = AuthState::from_ref(state);
        let identity = auth_state.authenticate(&parts.headers).await?;
        parts.extensions.insert(identity.clone());
        Ok(Self(identity))
    }
}

/// Axum extractor for an optional identity. Never rejects.
///
/// ```ignore
/// async fn handler(MaybeAuthenticated(identity): MaybeAuthenticated) -> String {
///     match identity {
///         Some(identity) => format!("Hello, {}!", identity.email),
///         None => "Hello, anonymous!".to_string(),
///     }
/// }
/// ```
pub struct MaybeAuthenticated(pub Option<RequestIdentity>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<RequestIdentity>() {
            return Ok(Self(Some(identity.clone())));
        }

        let auth_state = AuthState::from_ref(state);
        Ok(Self(auth_state.authenticate_optional(&parts.headers).await))
    }
}

// =============================================================================
// Token Extraction
// =============================================================================

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

/// Extract token from cookie if cookie auth is enabled.
fn extract_token_from_cookie(headers: &HeaderMap, cookie_config: &CookieConfig) -> Option<String> {
    if !cookie_config.enabled {
        return None;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| Cookie::split_parse(h))
        .filter_map(Result::ok)
        .find(|c| c.name() == cookie_config.name && !c.value().is_empty())
        .map(|c| {
            tracing::debug!(cookie_name = %cookie_config.name, "Token extracted from cookie");
            c.value().to_string()
        })
}

// =============================================================================
// Tests
// =============================================================================
