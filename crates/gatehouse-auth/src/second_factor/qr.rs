//! QR rendering of enrollment URIs.

use totp_rs::TOTP;

use crate::AuthResult;
use crate::error::AuthError;

/// Renders an enrollment URI as a scannable image.
pub trait QrRenderer: Send + Sync {
    /// Returns a `data:` URL embedding the rendered image.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI cannot be rendered.
    fn render(&self, uri: &str) -> AuthResult<String>;
}

/// PNG renderer backed by `totp-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotpQrRenderer;

impl QrRenderer for TotpQrRenderer {
    fn render(&self, uri: &str) -> AuthResult<String> {
        let totp = TOTP::from_url(uri)
            .map_err(|e| AuthError::invalid_request(format!("invalid enrollment URI: {e}")))?;
        let png = totp
            .get_qr_base64()
            .map_err(|e| AuthError::internal(format!("QR generation failed: {e}")))?;
        Ok(format!("data:image/png;base64,{png}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecondFactorConfig;
    use crate::second_factor::TotpVerifier;

    #[test]
    fn test_renders_png_data_url() {
        let verifier = TotpVerifier::new(&SecondFactorConfig::default());
        let secret = verifier.generate_secret().unwrap();
        let uri = verifier.enrollment_uri(&secret, "bob@example.com").unwrap();

        let data_url = TotpQrRenderer.render(&uri).unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
        assert!(data_url.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn test_rejects_garbage_uri() {
        assert!(TotpQrRenderer.render("https://example.com").is_err());
    }
}
