use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AuthError, AuthResult};

const BEARER_SCHEME: &str = "Bearer";

/// Reads the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<String> {
    let header_value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    parse_bearer(header_value)
}

/// Accepts exactly one `Bearer <token>` pair separated by a single space.
pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    if raw.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let mut parts = raw.split(' ');
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedCredential);
    };

    if scheme != BEARER_SCHEME || token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }

    Ok(token.to_owned())
}
