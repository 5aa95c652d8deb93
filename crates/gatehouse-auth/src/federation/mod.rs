//! Federated sign-in.
//!
//! - [`profile`] - validation of provider profile documents
//! - [`provider`] - provider trait, OAuth provider and the name registry
//! - [`linking`] - resolving a profile to an account

pub mod linking;
pub mod profile;
pub mod provider;

pub(crate) use linking::assign_default_role;
pub use linking::{IdentityLinker, LinkAction, LinkedIdentity, LinkingConfig};
pub use profile::{FederatedProfile, ProviderProfile};
pub use provider::{
    FederatedCallback, FederatedProvider, OAuthProvider, ProfileExchange, ProviderRegistry,
};
