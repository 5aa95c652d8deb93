//! Second-factor (TOTP) verification and enrollment state.
//!
//! An account moves through three states:
//!
//! ```text
//! Disabled --begin enrollment--> Pending --confirm(code)--> Enabled
//!    ^                                                         |
//!    +------------------------disable(code)--------------------+
//! ```
//!
//! `Pending` holds a secret that has not yet been proven. Restarting
//! enrollment from `Pending` replaces the secret.

pub mod qr;
pub mod totp;

use serde::{Deserialize, Serialize};

pub use qr::{QrRenderer, TotpQrRenderer};
pub use totp::TotpVerifier;

/// Second-factor state of an account, derived from its stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactorStatus {
    /// No secret stored.
    Disabled,
    /// Secret stored, not yet confirmed with a code.
    Pending,
    /// Confirmed; sign-in requires a code.
    Enabled,
}

/// What the caller shows the user to complete enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct SecondFactorEnrollment {
    /// Base32 secret for manual entry.
    pub secret: String,

    /// `otpauth://` URI for authenticator apps.
    pub otpauth_uri: String,

    /// Rendered QR code (`data:` URL) when a renderer is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}
