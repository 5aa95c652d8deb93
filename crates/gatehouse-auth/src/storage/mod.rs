//! Storage traits for accounts, roles and permissions.
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `gatehouse-auth-memory` - in-process backend for tests and embedding

pub mod role;
pub mod seed;
pub mod user;

pub use role::{Permission, Role, RoleGrant, RoleStorage};
pub use seed::seed_defaults;
pub use user::{
    AccountOrigin, LOCAL_PROVIDER, User, UserBuilder, UserProfile, UserStorage, UserWithRoles,
    normalize_email,
};
