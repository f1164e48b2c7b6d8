use axum::http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures raised while issuing tokens or admitting a request.
///
/// Callers only ever see a generic unauthorized body; the variant is kept for
/// logging and metrics.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingCredential,
    #[error("authorization header malformed")]
    MalformedCredential,
    #[error("token verification failed: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("token subject '{0}' does not resolve to a customer")]
    UnknownSubject(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("identity lookup failed: {0}")]
    Lookup(String),
}

impl AuthError {
    /// Short, stable label describing why a request was rejected.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::InvalidToken(_) | AuthError::InvalidClaim(_, _) => "invalid_token",
            AuthError::Expired => "expired",
            AuthError::Revoked => "revoked",
            AuthError::UnknownSubject(_) => "unknown_subject",
            AuthError::Signing(_) | AuthError::EmptySecret => "signing",
            AuthError::Lookup(_) => "lookup",
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        !matches!(
            self,
            AuthError::Signing(_) | AuthError::EmptySecret | AuthError::Lookup(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::InvalidToken(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if !self.is_unauthorized() {
            let body = ErrorBody {
                code: "SERVER_ERROR",
                message: "Unable to authenticate request.",
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }

        let body = ErrorBody {
            code: "UNAUTHORIZED",
            message: "Authentication required.",
        };
        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}
