//! Password hashing and verification.
//!
//! Hashes are Argon2id PHC strings with a per-hash random salt. Verification
//! never surfaces an error: a malformed stored hash simply fails to match.
//!
//! ```
//! use gatehouse_auth::credential::{hash_password, verify_password};
//!
//! let hash = hash_password("correct horse").unwrap();
//! assert!(verify_password(&hash, "correct horse"));
//! assert!(!verify_password(&hash, "battery staple"));
//! assert!(!verify_password("not-a-phc-string", "correct horse"));
//! ```

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

/// Hashes a plaintext password for storage.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the hasher rejects its input (rare).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored hash.
///
/// Returns `false` for a wrong password and for a hash that cannot be parsed.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Spends one Argon2 verification on `password` and returns `false`.
///
/// Login calls this when there is no stored hash to check, so an unknown
/// email costs the same as a wrong password.
#[must_use]
pub fn verify_without_account(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| {
        let unguessable = SaltString::generate(&mut OsRng);
        hash_password(unguessable.as_str()).ok()
    });
    if let Some(hash) = dummy {
        let _ = verify_password(hash, password);
    }
    false
}
