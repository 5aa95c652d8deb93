//! Authentication and authorization error types.
//!
//! Every fallible operation in this crate reports an [`AuthError`]. The
//! variants map one-to-one onto the outcomes a caller has to tell apart:
//! bad credentials, an untrusted token, a missing second factor, missing
//! grants, duplicates, and infrastructure failures.

use std::fmt;

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email/password authentication failed.
    ///
    /// Deliberately carries no detail: unknown account, passwordless account,
    /// malformed stored hash and wrong password all look the same.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The token is malformed, forged, expired, or otherwise untrusted.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The request carries no usable credential, or the credential points at
    /// an account that no longer exists.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The token is valid but was issued before the second factor was proven.
    #[error("Second factor verification required")]
    SecondFactorRequired,

    /// A one-time code was rejected.
    #[error("Invalid second factor code")]
    SecondFactorInvalid,

    /// The identity holds none of the permissions the route requires.
    #[error("Insufficient permissions: requires any of [{}]", .required.join(", "))]
    InsufficientPermission {
        /// Permission names of which at least one was required.
        required: Vec<String>,
    },

    /// The identity holds none of the roles the route requires.
    #[error("Insufficient role: requires any of [{}]", .required.join(", "))]
    InsufficientRole {
        /// Role names of which at least one was required.
        required: Vec<String>,
    },

    /// An account with this email already exists.
    #[error("Account already exists: {email}")]
    DuplicateAccount {
        /// The conflicting (normalized) email.
        email: String,
    },

    /// A uniqueness constraint other than the account email was violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting record.
        message: String,
    },

    /// The request is invalid for the account's current state or is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The identity provider is unknown or returned an error.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider {
        /// The identity provider name.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InsufficientPermission` error.
    #[must_use]
    pub fn insufficient_permission<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InsufficientPermission {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a new `InsufficientRole` error.
    #[must_use]
    pub fn insufficient_role<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InsufficientRole {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a new `DuplicateAccount` error.
    #[must_use]
    pub fn duplicate_account(email: impl Into<String>) -> Self {
        Self::DuplicateAccount {
            email: email.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
                | Self::IdentityProvider { .. }
        )
    }

    /// Returns `true` if this is an authentication error.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::InvalidToken { .. }
                | Self::Unauthorized { .. }
                | Self::SecondFactorRequired
                | Self::SecondFactorInvalid
        )
    }

    /// Returns `true` if this is an authorization error.
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientPermission { .. } | Self::InsufficientRole { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredentials => ErrorCategory::Authentication,
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::SecondFactorRequired => ErrorCategory::SecondFactor,
            Self::SecondFactorInvalid => ErrorCategory::SecondFactor,
            Self::InsufficientPermission { .. } => ErrorCategory::Authorization,
            Self::InsufficientRole { .. } => ErrorCategory::Authorization,
            Self::DuplicateAccount { .. } => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Validation,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::IdentityProvider { .. } => ErrorCategory::Federation,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable machine-readable code reported to clients.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken { .. } => "INVALID_TOKEN",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::SecondFactorRequired => "SECOND_FACTOR_REQUIRED",
            Self::SecondFactorInvalid => "SECOND_FACTOR_INVALID",
            Self::InsufficientPermission { .. } => "INSUFFICIENT_PERMISSION",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::DuplicateAccount { .. } => "DUPLICATE_ACCOUNT",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::IdentityProvider { .. } => "IDENTITY_PROVIDER_ERROR",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "SERVER_ERROR"
            }
        }
    }
}

/// Categories of authentication/authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failures.
    Authentication,
    /// Role and permission checks.
    Authorization,
    /// Token validation failures.
    Token,
    /// One-time code failures and unverified sessions.
    SecondFactor,
    /// Request validation and uniqueness errors.
    Validation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
    /// Identity provider federation errors.
    Federation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::SecondFactor => write!(f, "second_factor"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
            Self::Federation => write!(f, "federation"),
        }
    }
}
