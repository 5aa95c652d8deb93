//! # gatehouse-auth
//!
//! Authentication and authorization core for Gatehouse.
//!
//! This crate provides:
//! - Local email/password accounts (argon2)
//! - TOTP second factor with enrollment and a pending-token exchange
//! - Stateless signed session tokens (JWT)
//! - Federated sign-in with account linking
//! - Role-based access control resolved fresh on every request
//! - Axum guards for mandatory, optional, permission- and role-gated routes
//!
//! ## Overview
//!
//! A request starts anonymous. A credential check (password or federated
//! callback) yields a token. If the account has the second factor enabled,
//! that token is *pending* and every guard rejects it with
//! [`AuthError::SecondFactorRequired`] until it is exchanged for a fully
//! trusted token with a valid one-time code.
//!
//! ## Modules
//!
//! - [`config`] - Authentication configuration
//! - [`credential`] - Password hashing and verification
//! - [`second_factor`] - TOTP secrets, codes, enrollment state, QR rendering
//! - [`token`] - Token issuance and verification
//! - [`storage`] - Storage traits for accounts, roles and permissions
//! - [`rbac`] - Role and permission resolution
//! - [`federation`] - Federated providers and identity linking
//! - [`service`] - Sign-in and second-factor flows
//! - [`middleware`] - HTTP guards and error responses
//! - [`observability`] - Tracing setup

pub mod config;
pub mod credential;
pub mod error;
pub mod federation;
pub mod middleware;
pub mod observability;
pub mod rbac;
pub mod second_factor;
pub mod service;
pub mod storage;
pub mod token;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use federation::{
    FederatedCallback, FederatedProfile, FederatedProvider, IdentityLinker, LinkAction,
    LinkedIdentity, ProviderProfile, ProviderRegistry,
};
pub use middleware::{
    AccessRequirement, AuthState, Authenticated, MaybeAuthenticated, RequestIdentity,
    enforce_access, optional_authentication, require_authentication,
};
pub use rbac::{PermissionResolver, ResolvedAccess};
pub use second_factor::{SecondFactorEnrollment, SecondFactorStatus, TotpVerifier};
pub use service::{AuthOutcome, AuthService, RegisterRequest};
pub use storage::{Permission, Role, RoleGrant, RoleStorage, User, UserProfile, UserStorage};
pub use token::{TokenService, TrustClaims};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use gatehouse_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::federation::{
        FederatedCallback, FederatedProfile, FederatedProvider, ProviderRegistry,
    };
    pub use crate::middleware::{
        AccessRequirement, AuthState, Authenticated, MaybeAuthenticated, RequestIdentity,
        enforce_access, optional_authentication, require_authentication,
    };
    pub use crate::service::{AuthOutcome, AuthService, RegisterRequest};
    pub use crate::storage::{RoleStorage, User, UserStorage};
}
