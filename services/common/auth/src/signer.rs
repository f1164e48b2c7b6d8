use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

use crate::claims::ClaimsRepr;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Issues HS256 bearer tokens. Holds no mutable state.
pub struct TokenSigner {
    config: JwtConfig,
    encoding_key: EncodingKey,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

impl TokenSigner {
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        Ok(Self {
            config,
            encoding_key,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Signs a token binding `subject` and `role` that expires after the configured ttl.
    pub fn issue(&self, subject: &str, role: &str) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = TimeDelta::try_seconds(self.config.ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Signing(format!(
                    "token ttl of {}s is out of range",
                    self.config.ttl_seconds
                ))
            })?;

        let claims = ClaimsRepr {
            sub: subject.to_string(),
            role: role.to_string(),
            exp: expires_at.timestamp(),
            iat: Some(now.timestamp()),
            iss: self.config.issuer.clone(),
            jti: Some(Uuid::new_v4().to_string()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.config.ttl_seconds,
            token_type: "Bearer",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_ttl_is_a_signing_error() {
        let signer = TokenSigner::new(JwtConfig::new("secret", "ledger").with_ttl(i64::MAX)).unwrap();
        let result = signer.issue("alice", "user");
        assert!(matches!(result, Err(AuthError::Signing(_))));
    }

    #[test]
    fn rejects_empty_secret() {
        let result = TokenSigner::new(JwtConfig::new("", "ledger"));
        assert!(matches!(result, Err(AuthError::EmptySecret)));
    }

    #[test]
    fn tokens_for_same_subject_are_distinct() {
        let signer = TokenSigner::new(JwtConfig::new("test-secret", "ledger")).expect("signer");
        let first = signer.issue("alice", "user").expect("first token");
        let second = signer.issue("alice", "user").expect("second token");
        assert_ne!(first.token, second.token);
        assert_eq!(first.token_type, "Bearer");
        assert_eq!(first.expires_in, 3600);
    }
}
