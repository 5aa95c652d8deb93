//! RFC 6238 one-time codes.
//!
//! Secrets are 160 random bits stored base32-encoded. Codes use HMAC-SHA1
//! with the step, digit count and skew from [`SecondFactorConfig`].

use std::time::{SystemTime, UNIX_EPOCH};

use totp_rs::{Algorithm, Secret, TOTP};

use crate::AuthResult;
use crate::config::SecondFactorConfig;
use crate::error::AuthError;

/// Generates secrets, enrollment URIs and checks one-time codes.
#[derive(Debug, Clone)]
pub struct TotpVerifier {
    issuer: String,
    digits: usize,
    step: u64,
    skew: u8,
}

impl TotpVerifier {
    /// Creates a verifier from configuration.
    #[must_use]
    pub fn new(config: &SecondFactorConfig) -> Self {
        Self {
            issuer: config.issuer_name.clone(),
            digits: config.digits,
            step: config.step.as_secs().max(1),
            skew: config.skew,
        }
    }

    /// Issuer label embedded in enrollment URIs.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Generates a fresh 160-bit secret, base32-encoded.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the random secret cannot be encoded.
    pub fn generate_secret(&self) -> AuthResult<String> {
        match Secret::generate_secret().to_encoded() {
            Secret::Encoded(encoded) => Ok(encoded),
            Secret::Raw(_) => Err(AuthError::internal("secret encoding failed")),
        }
    }

    /// Builds the `otpauth://totp/...` URI an authenticator app enrolls from.
    ///
    /// Deterministic for a given secret and account label.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` when the secret is not valid base32
    /// or the account label cannot be embedded (it contains `:`).
    pub fn enrollment_uri(&self, secret: &str, account: &str) -> AuthResult<String> {
        Ok(self.totp(secret, account)?.get_url())
    }

    /// Checks `code` against `secret` at the current time.
    ///
    /// Codes from one step either side of the current step are accepted.
    /// A malformed secret never verifies.
    #[must_use]
    pub fn verify(&self, secret: &str, code: &str) -> bool {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(now) => self.verify_at(secret, code, now.as_secs()),
            Err(_) => false,
        }
    }

    /// Checks `code` against `secret` at `unix_time` (seconds).
    #[must_use]
    pub fn verify_at(&self, secret: &str, code: &str, unix_time: u64) -> bool {
        let code = code.trim();
        if code.len() != self.digits || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        match self.totp(secret, "") {
            Ok(totp) => totp.check(code, unix_time),
            Err(e) => {
                tracing::warn!(error = %e, "Stored second factor secret is unusable");
                false
            }
        }
    }

    /// Computes the code for `secret` at `unix_time`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` when the secret is not valid base32.
    pub fn code_at(&self, secret: &str, unix_time: u64) -> AuthResult<String> {
        Ok(self.totp(secret, "")?.generate(unix_time))
    }

    /// Step length in seconds.
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    fn totp(&self, secret: &str, account: &str) -> AuthResult<TOTP> {
        let bytes = Secret::Encoded(secret.trim().to_ascii_uppercase())
            .to_bytes()
            .map_err(|e| AuthError::invalid_request(format!("invalid second factor secret: {e}")))?;

        TOTP::new(
            Algorithm::SHA1,
            self.digits,
            self.skew,
            self.step,
            bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AuthError::invalid_request(format!("second factor setup failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B seed ("12345678901234567890"), base32.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn verifier() -> TotpVerifier {
        TotpVerifier::new(&SecondFactorConfig::default())
    }

    #[test]
    fn test_generated_secret_is_160_bits() {
        let secret = verifier().generate_secret().unwrap();
        // 20 bytes -> 32 base32 characters without padding
        assert_eq!(secret.len(), 32);
        let bytes = Secret::Encoded(secret).to_bytes().unwrap();
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn test_secrets_are_unique() {
        let v = verifier();
        assert_ne!(v.generate_secret().unwrap(), v.generate_secret().unwrap());
    }

    #[test]
    fn test_rfc6238_vector() {
        // T = 59 -> 94287082 for 8 digits; the 6-digit code is the low 6 digits.
        assert_eq!(verifier().code_at(RFC_SECRET, 59).unwrap(), "287082");
    }

    #[test]
    fn test_rfc6238_adjacent_steps() {
        let v = verifier();
        assert_eq!(v.code_at(RFC_SECRET, 1_111_111_109).unwrap(), "081804");
        assert_eq!(v.code_at(RFC_SECRET, 1_111_111_111).unwrap(), "050471");
    }

    #[test]
    fn test_skew_window() {
        let v = verifier();
        let now = 1_111_111_111u64;

        assert!(v.verify_at(RFC_SECRET, "050471", now));
        assert!(v.verify_at(RFC_SECRET, "081804", now));
        assert_eq!(v.code_at(RFC_SECRET, now + 30).unwrap(), "266759");
        assert!(v.verify_at(RFC_SECRET, "266759", now));

        // Three steps back is outside the window.
        assert_eq!(v.code_at(RFC_SECRET, now - 90).unwrap(), "150727");
        assert!(!v.verify_at(RFC_SECRET, "150727", now));
    }

    #[test]
    fn test_code_from_other_secret_is_rejected() {
        const OTHER_SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";
        let v = verifier();
        let now = 1_111_111_111u64;

        for t in [now - 30, now, now + 30] {
            let code = v.code_at(RFC_SECRET, t).unwrap();
            assert!(v.verify_at(RFC_SECRET, &code, t));
            assert!(!v.verify_at(OTHER_SECRET, &code, t), "accepted at {t}");
        }
    }

    #[test]
    fn test_rejects_malformed_codes() {
        let v = verifier();
        let now = 1_700_000_000u64;
        assert!(!v.verify_at(RFC_SECRET, "", now));
        assert!(!v.verify_at(RFC_SECRET, "12345", now));
        assert!(!v.verify_at(RFC_SECRET, "abcdef", now));
        assert!(!v.verify_at(RFC_SECRET, "1234567", now));
    }

    #[test]
    fn test_malformed_secret_never_verifies() {
        let v = verifier();
        assert!(!v.verify_at("not base32!", "123456", 1_700_000_000));
        assert!(v.code_at("not base32!", 0).is_err());
    }

    #[test]
    fn test_verify_current_time() {
        let v = verifier();
        let secret = v.generate_secret().unwrap();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let code = v.code_at(&secret, now).unwrap();
        assert!(v.verify(&secret, &code));
    }

    #[test]
    fn test_enrollment_uri_is_deterministic() {
        let v = verifier();
        let first = v.enrollment_uri(RFC_SECRET, "alice@example.com").unwrap();
        let second = v.enrollment_uri(RFC_SECRET, "alice@example.com").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("otpauth://totp/Gatehouse:alice"));
        assert!(first.contains(&format!("secret={RFC_SECRET}")));
        assert!(first.contains("issuer=Gatehouse"));
    }

    #[test]
    fn test_enrollment_uri_rejects_colon_account() {
        assert!(verifier().enrollment_uri(RFC_SECRET, "a:b").is_err());
    }
}
