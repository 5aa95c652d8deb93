//! Federated identity providers and their registry.
//!
//! A provider does two things: it builds the redirect that starts a
//! sign-in (the challenge), and it turns the callback into a
//! [`FederatedProfile`]. The outbound code exchange and profile fetch are
//! delegated to a [`ProfileExchange`] implementation supplied by the host
//! application.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::AuthResult;
use crate::config::{FederationConfig, ProviderConfig};
use crate::error::AuthError;

use super::profile::FederatedProfile;

/// Query parameters a provider sends back to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederatedCallback {
    /// Authorization code.
    pub code: Option<String>,
    /// Opaque state echoed from the challenge.
    pub state: Option<String>,
    /// Provider error code when the user declined or the request failed.
    pub error: Option<String>,
    /// Human-readable provider error.
    pub error_description: Option<String>,
}

/// A named sign-in provider.
#[async_trait]
pub trait FederatedProvider: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Builds the URL the browser is redirected to.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge cannot be built.
    fn challenge(&self, state: &str) -> AuthResult<Url>;

    /// Completes the sign-in from the callback parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` when the provider reports an
    /// error or the exchange fails.
    async fn complete(&self, callback: &FederatedCallback) -> AuthResult<FederatedProfile>;
}

/// Exchanges an authorization code for the signed-in user's profile.
#[async_trait]
pub trait ProfileExchange: Send + Sync {
    /// Performs the token exchange and profile fetch for `provider`.
    async fn exchange(&self, provider: &ProviderConfig, code: &str) -> AuthResult<FederatedProfile>;
}

/// OAuth 2.0 authorization-code provider driven by [`ProviderConfig`].
pub struct OAuthProvider {
    config: ProviderConfig,
    exchange: Arc<dyn ProfileExchange>,
}

impl OAuthProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new(config: ProviderConfig, exchange: Arc<dyn ProfileExchange>) -> Self {
        Self { config, exchange }
    }

    /// Provider configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl FederatedProvider for OAuthProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn challenge(&self, state: &str) -> AuthResult<Url> {
        let mut url = self.config.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("state", state);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
        }
        Ok(url)
    }

    async fn complete(&self, callback: &FederatedCallback) -> AuthResult<FederatedProfile> {
        if let Some(error) = &callback.error {
            let detail = callback.error_description.as_deref().unwrap_or(error);
            tracing::info!(provider = %self.config.name, error = %error, "Provider declined sign-in");
            return Err(AuthError::identity_provider(&self.config.name, detail));
        }

        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AuthError::identity_provider(&self.config.name, "callback has no authorization code")
            })?;

        let profile = self.exchange.exchange(&self.config, code).await?;
        if profile.provider() != self.config.name.to_ascii_lowercase() {
            return Err(AuthError::identity_provider(
                &self.config.name,
                "profile was issued for a different provider",
            ));
        }
        Ok(profile)
    }
}

/// Name -> provider lookup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn FederatedProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry of [`OAuthProvider`]s from every enabled provider config.
    #[must_use]
    pub fn from_config(config: &FederationConfig, exchange: Arc<dyn ProfileExchange>) -> Self {
        let mut registry = Self::new();
        for provider in config.providers.iter().filter(|p| p.enabled) {
            registry.register(Arc::new(OAuthProvider::new(
                provider.clone(),
                Arc::clone(&exchange),
            )));
        }
        registry
    }

    /// Adds or replaces a provider under its lowercased name.
    pub fn register(&mut self, provider: Arc<dyn FederatedProvider>) {
        let name = provider.name().to_ascii_lowercase();
        tracing::debug!(provider = %name, "Registered identity provider");
        self.providers.insert(name, provider);
    }

    /// Looks up a provider by name.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` for an unknown name.
    pub fn get(&self, name: &str) -> AuthResult<Arc<dyn FederatedProvider>> {
        self.providers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AuthError::identity_provider(name, "provider is not configured"))
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns `true` if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
