//! Error responses for the authentication guards.
//!
//! Every [`AuthError`] renders as a JSON body:
//!
//! ```json
//! { "error": "Insufficient permissions", "code": "INSUFFICIENT_PERMISSION", "required": ["users:read"] }
//! ```
//!
//! `required` is present only for authorization failures. Server-side detail
//! is never echoed for 5xx responses.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

/// Realm advertised in `WWW-Authenticate`.
const REALM: &str = "gatehouse";

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let message = client_message(&self);

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                category = %self.category(),
                "Auth request failed"
            );
        }

        let mut body = json!({
            "error": message,
            "code": self.error_code(),
        });
        if let AuthError::InsufficientPermission { required }
        | AuthError::InsufficientRole { required } = &self
        {
            body["required"] = json!(required);
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(&self, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// HTTP status for an error.
#[must_use]
pub fn status_code(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidCredentials
        | AuthError::InvalidToken { .. }
        | AuthError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AuthError::SecondFactorRequired
        | AuthError::InsufficientPermission { .. }
        | AuthError::InsufficientRole { .. } => StatusCode::FORBIDDEN,
        AuthError::SecondFactorInvalid | AuthError::InvalidRequest { .. } => {
            StatusCode::BAD_REQUEST
        }
        AuthError::DuplicateAccount { .. } | AuthError::Conflict { .. } => StatusCode::CONFLICT,
        AuthError::IdentityProvider { .. } => StatusCode::BAD_GATEWAY,
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn client_message(error: &AuthError) -> String {
    match error {
        AuthError::InsufficientPermission { .. } => "Insufficient permissions".to_string(),
        AuthError::InsufficientRole { .. } => "Insufficient role".to_string(),
        AuthError::IdentityProvider { provider, .. } => {
            format!("Identity provider '{provider}' failed")
        }
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            "Internal server error".to_string()
        }
        other => other.to_string(),
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="gatehouse", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &AuthError, description: &str) -> String {
    match error {
        AuthError::InvalidToken { .. } => {
            let escaped_desc = description.replace('\\', "\\\\").replace('"', "\\\"");
            format!(
                "Bearer realm=\"{REALM}\", error=\"invalid_token\", error_description=\"{escaped_desc}\""
            )
        }
        _ => format!("Bearer realm=\"{REALM}\""),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response = AuthError::unauthorized("No token provided").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(www_auth, "Bearer realm=\"gatehouse\"");

        let json = body_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert!(json.get("required").is_none());
    }

    #[tokio::test]
    async fn test_invalid_token_response() {
        let response = AuthError::invalid_token("ExpiredSignature").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_second_factor_required_is_distinct() {
        let response = AuthError::SecondFactorRequired.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));

        let json = body_json(response).await;
        assert_eq!(json["code"], "SECOND_FACTOR_REQUIRED");
    }

    #[tokio::test]
    async fn test_insufficient_permission_lists_required() {
        let response = AuthError::insufficient_permission(["users:read", "admin"]).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["code"], "INSUFFICIENT_PERMISSION");
        assert_eq!(json["required"], json!(["users:read", "admin"]));
    }

    #[tokio::test]
    async fn test_server_error_hides_detail() {
        let response = AuthError::storage("connection refused at 10.0.0.3").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "SERVER_ERROR");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_code(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_code(&AuthError::SecondFactorInvalid),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&AuthError::duplicate_account("a@x.com")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_code(&AuthError::identity_provider("github", "timeout")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_www_authenticate_header_escaping() {
        let error = AuthError::invalid_token("x");
        let header = build_www_authenticate_header(&error, "Token contains \"quotes\"");
        assert!(header.contains("\\\"quotes\\\""));
    }
}
