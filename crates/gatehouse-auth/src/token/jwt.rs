//! Signed session tokens.
//!
//! Tokens are HMAC-signed JWTs carrying the account id, email and whether the
//! second factor was proven when the token was minted. A single process-wide
//! secret signs and verifies every token; there is no revocation list, so a
//! token is trusted until it expires.
//!
//! ```ignore
//! use gatehouse_auth::token::TokenService;
//!
//! let tokens = TokenService::new(&config.token)?;
//! let token = tokens.issue(user.id, &user.email, true)?;
//! let claims = tokens.verify(&token)?;
//! assert_eq!(claims.sub, user.id.to_string());
//! ```

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::AuthError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Invalid key or algorithm configuration.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError { message } => AuthError::internal(message),
            JwtError::InvalidKey { message } => AuthError::configuration(message),
            other => AuthError::invalid_token(other.to_string()),
        }
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustClaims {
    /// Issuer.
    pub iss: String,

    /// Subject: the account id.
    pub sub: String,

    /// Account email at issuance.
    pub email: String,

    /// Whether the second factor was proven when the token was minted.
    ///
    /// Only an explicit `false` marks a pending token; tokens without the
    /// claim are fully trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_factor_verified: Option<bool>,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// JWT ID.
    pub jti: String,
}

impl TrustClaims {
    /// Creates claims issued at `issued_at` and valid for `lifetime`.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        user_id: Uuid,
        email: impl Into<String>,
        second_factor_verified: bool,
        issued_at: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        let iat = issued_at.unix_timestamp();
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        Self {
            iss: issuer.into(),
            sub: user_id.to_string(),
            email: email.into(),
            second_factor_verified: Some(second_factor_verified),
            iat,
            exp: iat.saturating_add(lifetime),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Returns `true` if the token still awaits a one-time code.
    #[must_use]
    pub fn is_second_factor_pending(&self) -> bool {
        self.second_factor_verified == Some(false)
    }

    /// Parses the subject as an account id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the subject is not a UUID.
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::invalid_token("Malformed subject"))
    }
}

// ============================================================================
// Token Service
// ============================================================================

/// Issues and verifies session tokens.
///
/// This service is thread-safe (`Send + Sync`) and can be shared across
/// async tasks.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service from configuration.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` for an empty secret or a non-HMAC algorithm.
    pub fn new(config: &TokenConfig) -> Result<Self, JwtError> {
        if config.secret.is_empty() {
            return Err(JwtError::invalid_key("signing secret is empty"));
        }

        let algorithm = match config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(JwtError::invalid_key(format!(
                    "unsupported signing algorithm: {other}"
                )));
            }
        };

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            lifetime: config.lifetime,
        })
    }

    /// Issues a token for an account, valid for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        second_factor_verified: bool,
    ) -> Result<String, JwtError> {
        let claims = TrustClaims::new(
            self.issuer.clone(),
            user_id,
            email,
            second_factor_verified,
            OffsetDateTime::now_utc(),
            self.lifetime,
        );
        self.encode(&claims)
    }

    /// Encodes arbitrary claims with the process-wide secret.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &TrustClaims) -> Result<String, JwtError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a token, reporting the precise failure.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or validation fails.
    pub fn decode(&self, token: &str) -> Result<TrustClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<TrustClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }

    /// Verifies a token. Any failure yields `AuthError::InvalidToken`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed, forged, or expired tokens.
    pub fn verify(&self, token: &str) -> Result<TrustClaims, AuthError> {
        self.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            AuthError::invalid_token(e.to_string())
        })
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issuer claim value.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..TokenConfig::default()
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new(&config()).unwrap();
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id, "alice@example.com", true).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.second_factor_verified, Some(true));
        assert!(!claims.is_second_factor_pending());
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn test_pending_token() {
        let service = TokenService::new(&config()).unwrap();
        let token = service.issue(Uuid::new_v4(), "bob@example.com", false).unwrap();
        let claims = service.verify(&token).unwrap();
        assert!(claims.is_second_factor_pending());
    }

    #[test]
    fn test_missing_claim_is_trusted() {
        let service = TokenService::new(&config()).unwrap();
        let mut claims = TrustClaims::new(
            "gatehouse",
            Uuid::new_v4(),
            "carol@example.com",
            true,
            OffsetDateTime::now_utc(),
            Duration::from_secs(60),
        );
        claims.second_factor_verified = None;

        let token = service.encode(&claims).unwrap();
        let decoded = service.verify(&token).unwrap();
        assert_eq!(decoded.second_factor_verified, None);
        assert!(!decoded.is_second_factor_pending());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = TokenService::new(&config()).unwrap();
        let claims = TrustClaims::new(
            "gatehouse",
            Uuid::new_v4(),
            "dave@example.com",
            true,
            OffsetDateTime::now_utc() - time::Duration::hours(2),
            Duration::from_secs(3600),
        );
        let token = service.encode(&claims).unwrap();

        assert!(matches!(service.decode(&token), Err(JwtError::Expired)));
        assert!(matches!(
            service.verify(&token),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let service = TokenService::new(&config()).unwrap();
        let other = TokenService::new(&TokenConfig {
            secret: "ffffffffffffffffffffffffffffffff".to_string(),
            ..TokenConfig::default()
        })
        .unwrap();

        let token = other.issue(Uuid::new_v4(), "eve@example.com", true).unwrap();
        assert!(matches!(
            service.decode(&token),
            Err(JwtError::InvalidSignature)
        ));
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let service = TokenService::new(&config()).unwrap();
        for token in ["", "not-a-jwt", "a.b.c"] {
            assert!(matches!(
                service.verify(token),
                Err(AuthError::InvalidToken { .. })
            ));
        }
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let service = TokenService::new(&config()).unwrap();
        let other = TokenService::new(&TokenConfig {
            issuer: "someone-else".to_string(),
            ..config()
        })
        .unwrap();
        let token = other.issue(Uuid::new_v4(), "x@example.com", true).unwrap();
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(TokenService::new(&TokenConfig::default()).is_err());
        assert!(
            TokenService::new(&TokenConfig {
                algorithm: "RS256".to_string(),
                ..config()
            })
            .is_err()
        );
    }

    #[test]
    fn test_malformed_subject() {
        let mut claims = TrustClaims::new(
            "gatehouse",
            Uuid::new_v4(),
            "x@example.com",
            true,
            OffsetDateTime::now_utc(),
            Duration::from_secs(60),
        );
        claims.sub = "not-a-uuid".to_string();
        assert!(matches!(
            claims.user_id(),
            Err(AuthError::InvalidToken { .. })
        ));
    }
}
