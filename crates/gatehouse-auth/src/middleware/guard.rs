//! Route guards as axum middleware.
//!
//! Authentication guards attach a [`RequestIdentity`] to the request
//! extensions. Access guards read it back and check roles or permissions,
//! so they must be layered inside an authentication guard.
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use gatehouse_auth::middleware::{AccessRequirement, enforce_access, require_authentication};
//!
//! let users = Router::new()
//!     .route("/users", get(list_users))
//!     // runs second
//!     .route_layer(from_fn_with_state(
//!         AccessRequirement::any_permission(["users:read"]),
//!         enforce_access,
//!     ))
//!     // runs first
//!     .route_layer(from_fn_with_state(auth_state.clone(), require_authentication));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AuthResult;
use crate::error::AuthError;

use super::auth::AuthState;
use super::types::RequestIdentity;

/// Rejects unauthenticated requests and attaches the identity otherwise.
///
/// # Errors
///
/// Rejects with the error from [`AuthState::authenticate`].
pub async fn require_authentication(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = state.authenticate(request.headers()).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Attaches the identity when the request authenticates; never rejects.
pub async fn optional_authentication(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(identity) = state.authenticate_optional(request.headers()).await {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

/// Roles or permissions of which an identity must hold at least one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Any one of these permissions.
    AnyPermission(Vec<String>),
    /// Any one of these roles.
    AnyRole(Vec<String>),
}

impl AccessRequirement {
    /// Requires any one of `permissions`.
    #[must_use]
    pub fn any_permission<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyPermission(permissions.into_iter().map(Into::into).collect())
    }

    /// Requires any one of `roles`.
    #[must_use]
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    /// Checks an identity against the requirement.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientPermission` or `InsufficientRole` carrying the
    /// required names.
    pub fn check(&self, identity: &RequestIdentity) -> AuthResult<()> {
        match self {
            Self::AnyPermission(required) => identity.require_any_permission(required.as_slice()),
            Self::AnyRole(required) => identity.require_any_role(required.as_slice()),
        }
    }
}

/// Enforces an [`AccessRequirement`] on an authenticated request.
///
/// # Errors
///
/// Rejects with `Unauthorized` when no authentication guard ran first, and
/// with the requirement's error when access is missing.
pub async fn enforce_access(
    State(requirement): State<AccessRequirement>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = request
        .extensions()
        .get::<RequestIdentity>()
        .ok_or_else(|| AuthError::unauthorized("Not authenticated"))?;
    requirement.check(identity)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::ResolvedAccess;
    use crate::storage::{RoleGrant, User};

    #[test]
    fn test_check() {
        let user = User::new("admin@example.com");
        let identity = RequestIdentity::new(
            &user,
            ResolvedAccess::from_grants(&[RoleGrant::new("admin", ["admin"])]),
        );

        assert!(AccessRequirement::any_role(["admin"]).check(&identity).is_ok());
        assert!(
            AccessRequirement::any_permission(["users:read", "admin"])
                .check(&identity)
                .is_ok()
        );

        match AccessRequirement::any_permission(["users:read"]).check(&identity) {
            Err(AuthError::InsufficientPermission { required }) => {
                assert_eq!(required, vec!["users:read"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
