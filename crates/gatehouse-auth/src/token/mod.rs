//! Token issuance and verification.

pub mod jwt;

pub use jwt::{JwtError, TokenService, TrustClaims};
