//! Validated federated profiles.
//!
//! Providers return loosely shaped profile documents. [`ProviderProfile`]
//! accepts that shape; [`FederatedProfile`] is what the rest of the crate
//! works with: trimmed, lowercased where it matters, empties removed.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::normalize_email;

/// Profile document as returned by a provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderProfile {
    /// Provider-side account id.
    pub id: String,
    /// Email addresses, preferred first.
    pub emails: Vec<String>,
    /// Full display name.
    pub display_name: Option<String>,
    /// Login handle (GitHub-style providers).
    pub username: Option<String>,
    /// Given name (OIDC-style providers).
    pub given_name: Option<String>,
    /// Picture URLs, preferred first.
    pub photos: Vec<String>,
}

/// A federated identity ready for linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    provider: String,
    external_id: String,
    email: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<Url>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl FederatedProfile {
    /// Creates a profile with only the identity pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` if either part is blank.
    pub fn new(provider: impl AsRef<str>, external_id: impl AsRef<str>) -> AuthResult<Self> {
        let provider = provider.as_ref().trim().to_ascii_lowercase();
        let external_id = external_id.as_ref().trim().to_string();
        if provider.is_empty() {
            return Err(AuthError::identity_provider("unknown", "provider name is empty"));
        }
        if external_id.is_empty() {
            return Err(AuthError::identity_provider(
                provider,
                "profile has no account id",
            ));
        }

        Ok(Self {
            provider,
            external_id,
            email: None,
            display_name: None,
            avatar_url: None,
        })
    }

    /// Normalizes a raw provider document.
    ///
    /// Picks the first non-empty email and photo, and falls back from display
    /// name to username to given name. Unparsable avatar URLs are dropped.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` if the document has no account id.
    pub fn from_provider_profile(provider: &str, raw: ProviderProfile) -> AuthResult<Self> {
        let email = raw.emails.iter().find_map(|e| non_empty(Some(e.as_str())));
        let display_name = non_empty(raw.display_name.as_deref())
            .or_else(|| non_empty(raw.username.as_deref()))
            .or_else(|| non_empty(raw.given_name.as_deref()));
        let avatar_url = raw
            .photos
            .iter()
            .find_map(|p| non_empty(Some(p.as_str())))
            .and_then(|p| Url::parse(&p).ok());

        Ok(Self::new(provider, raw.id)?
            .with_email(email)
            .with_display_name(display_name)
            .with_avatar_url(avatar_url))
    }

    /// Sets the email (normalized; blank becomes `None`).
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = non_empty(email.as_deref()).map(|e| normalize_email(&e));
        self
    }

    /// Sets the display name (trimmed; blank becomes `None`).
    #[must_use]
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = non_empty(name.as_deref());
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_avatar_url(mut self, url: Option<Url>) -> Self {
        self.avatar_url = url;
        self
    }

    /// Provider name, lowercased.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider-side account id.
    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Normalized email, if the provider shared one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Avatar URL.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&Url> {
        self.avatar_url.as_ref()
    }

    /// The profile's email, or a synthetic address unique to this identity.
    ///
    /// The synthetic form is `{external_id}@{provider}.{domain}`, so the same
    /// external id at two providers never collides.
    #[must_use]
    pub fn email_or_placeholder(&self, domain: &str) -> String {
        match &self.email {
            Some(email) => email.clone(),
            None => normalize_email(&format!(
                "{}@{}.{}",
                self.external_id, self.provider, domain
            )),
        }
    }
}
