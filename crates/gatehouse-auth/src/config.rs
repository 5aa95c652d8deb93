//! Authentication configuration.
//!
//! All sections deserialize with defaults so a partial TOML file (or none at
//! all) yields a usable configuration. Durations use humantime notation.
//!
//! # Example (TOML)
//!
//! ```toml
//! [token]
//! secret = "change-me-to-at-least-32-bytes-of-entropy"
//! lifetime = "7d"
//!
//! [second_factor]
//! issuer_name = "Gatehouse"
//! pending_exchange_window = "10m"
//!
//! [[federation.providers]]
//! name = "github"
//! client_id = "abc"
//! client_secret = "def"
//! authorization_endpoint = "https://github.com/login/oauth/authorize"
//! redirect_uri = "https://app.example.com/auth/github/callback"
//! scopes = ["user:email"]
//! ```

use std::path::Path;
use std::time::Duration;

use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

/// Minimum HMAC secret length accepted by [`AuthConfig::validate`].
pub const MIN_SECRET_LENGTH: usize = 32;

/// Root authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing and lifetime.
    pub token: TokenConfig,

    /// Session cookie used by browser clients.
    pub cookie: CookieConfig,

    /// One-time code parameters.
    pub second_factor: SecondFactorConfig,

    /// Federated sign-in.
    pub federation: FederationConfig,

    /// Local password policy.
    pub password: PasswordConfig,
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Process-wide HMAC signing secret.
    pub secret: String,

    /// Signing algorithm. Supported: "HS256", "HS384", "HS512".
    pub algorithm: String,

    /// Lifetime of every issued token.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,

    /// Value of the `iss` claim.
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: "HS256".to_string(),
            lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            issuer: "gatehouse".to_string(),
        }
    }
}

/// Cookie configuration for browser-based authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Accept and emit the session cookie.
    pub enabled: bool,

    /// Cookie name.
    pub name: String,

    /// Send only over HTTPS.
    pub secure: bool,

    /// Hide from client-side scripts.
    pub http_only: bool,

    /// SameSite policy: "strict", "lax" or "none".
    pub same_site: String,

    /// Cookie path.
    pub path: String,

    /// Cookie domain; host-only when unset.
    pub domain: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "token".to_string(),
            secure: false,
            http_only: true,
            same_site: "lax".to_string(),
            path: "/".to_string(),
            domain: None,
        }
    }
}

impl CookieConfig {
    /// Builds a `Set-Cookie` value carrying `value` for `max_age_secs` seconds.
    ///
    /// Returns `None` when cookie authentication is disabled.
    #[must_use]
    pub fn build_cookie(&self, value: &str, max_age_secs: i64) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let cookie = self
            .builder(value.to_string())
            .max_age(time::Duration::seconds(max_age_secs))
            .build();
        Some(cookie.to_string())
    }

    /// Builds a `Set-Cookie` value that removes the session cookie (logout).
    #[must_use]
    pub fn build_clear_cookie(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let mut cookie = self.builder(String::new()).build();
        cookie.make_removal();
        Some(cookie.to_string())
    }

    fn builder(&self, value: String) -> cookie::CookieBuilder<'static> {
        let same_site = match self.same_site.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        };

        let mut builder = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(same_site);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder
    }
}

/// Second-factor (TOTP) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecondFactorConfig {
    /// Issuer label shown by authenticator apps.
    pub issuer_name: String,

    /// Code length.
    pub digits: usize,

    /// Time step.
    #[serde(with = "humantime_serde")]
    pub step: Duration,

    /// Accepted steps of clock drift on either side of the current one.
    pub skew: u8,

    /// How long after issuance a pending token may be exchanged for a full one.
    #[serde(with = "humantime_serde")]
    pub pending_exchange_window: Duration,
}

impl Default for SecondFactorConfig {
    fn default() -> Self {
        Self {
            issuer_name: "Gatehouse".to_string(),
            digits: 6,
            step: Duration::from_secs(30),
            skew: 1,
            pending_exchange_window: Duration::from_secs(600), // 10 minutes
        }
    }
}

/// Federated sign-in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Role assigned to every account created through federation or registration.
    pub default_role: String,

    /// Domain of the synthetic address given to profiles without an email.
    pub placeholder_email_domain: String,

    /// Configured providers.
    pub providers: Vec<ProviderConfig>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            default_role: "user".to_string(),
            placeholder_email_domain: "oauth.invalid".to_string(),
            providers: Vec::new(),
        }
    }
}

/// A single OAuth 2.0 identity provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Registry key, e.g. "google" or "github".
    pub name: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Provider authorization endpoint.
    pub authorization_endpoint: url::Url,

    /// Callback URL registered with the provider.
    pub redirect_uri: url::Url,

    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Disabled providers are skipped when the registry is built.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Local password policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Minimum accepted password length at registration.
    pub min_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration source could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl AuthConfig {
    /// Parses a TOML document. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the document is not valid TOML for this shape.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Reads and validates a TOML file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file cannot be read or parsed, and
    /// any validation error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from an optional file, then applies environment
    /// overrides of the form `GATEHOUSE__TOKEN__SECRET=...`, then validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` on unreadable sources and any validation error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Load(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("GATEHOUSE")
                .try_parsing(true)
                .separator("__"),
        );

        let merged: Self = builder
            .build()
            .and_then(Config::try_deserialize::<Self>)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when the signing secret is empty, and
    /// `ConfigError::InvalidValue` for any out-of-range setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.secret.is_empty() {
            return Err(ConfigError::Missing("token.secret".to_string()));
        }
        if self.token.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "token.secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        match self.token.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{}'. Must be HS256, HS384, or HS512",
                    other
                )));
            }
        }

        if self.token.lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token.lifetime must be > 0".to_string(),
            ));
        }

        if !(6..=8).contains(&self.second_factor.digits) {
            return Err(ConfigError::InvalidValue(
                "second_factor.digits must be between 6 and 8".to_string(),
            ));
        }
        if self.second_factor.step.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "second_factor.step must be at least one second".to_string(),
            ));
        }
        if self.second_factor.issuer_name.contains(':') {
            return Err(ConfigError::InvalidValue(
                "second_factor.issuer_name must not contain ':'".to_string(),
            ));
        }

        if self.federation.default_role.is_empty() {
            return Err(ConfigError::Missing("federation.default_role".to_string()));
        }
        for provider in &self.federation.providers {
            if provider.name.is_empty() || provider.client_id.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "federation provider requires name and client_id".to_string(),
                ));
            }
        }

        if self.password.min_length == 0 {
            return Err(ConfigError::InvalidValue(
                "password.min_length must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
