//! HTTP middleware for authentication and authorization.
//!
//! This module provides Axum middleware for:
//!
//! - Token extraction from the `Authorization` header or the session cookie
//! - Mandatory and optional request authentication
//! - Permission- and role-gated access
//! - JSON error responses
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use gatehouse_auth::middleware::{
//!     AccessRequirement, Authenticated, enforce_access, require_authentication,
//! };
//!
//! async fn admin_panel(Authenticated(identity): Authenticated) -> String {
//!     format!("Hello, {}!", identity.email)
//! }
//!
//! let app = Router::new()
//!     .route("/admin", get(admin_panel))
//!     .route_layer(from_fn_with_state(AccessRequirement::any_role(["admin"]), enforce_access))
//!     .route_layer(from_fn_with_state(auth_state.clone(), require_authentication))
//!     .with_state(auth_state);
//! ```

pub mod auth;
pub mod error;
pub mod guard;
pub mod types;

pub use auth::{AuthState, Authenticated, MaybeAuthenticated};
pub use error::status_code;
pub use guard::{AccessRequirement, enforce_access, optional_authentication, require_authentication};
pub use types::RequestIdentity;
