use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use chrono::{DateTime, Utc};
use common_auth::{bearer_token, AuthError, AuthResult, JwtVerifier};
use tracing::{debug, warn};

use crate::customers::CredentialStore;
use crate::error::LedgerError;
use crate::revocation::RevocationList;

/// Identity of an admitted request, handed explicitly to downstream handlers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub customer_id: String,
    pub username: String,
    pub role: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Admits a request only after every check passed, in this order:
/// extract the bearer token, verify signature and expiry, check revocation,
/// resolve the subject to a customer.
pub struct AuthenticationGate {
    verifier: Arc<JwtVerifier>,
    revocations: Arc<RevocationList>,
    customers: Arc<CredentialStore>,
}

impl AuthenticationGate {
    pub fn new(
        verifier: Arc<JwtVerifier>,
        revocations: Arc<RevocationList>,
        customers: Arc<CredentialStore>,
    ) -> Self {
        Self {
            verifier,
            revocations,
            customers,
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> AuthResult<Principal> {
        let token = bearer_token(headers)?;
        self.admit(token)
    }

    pub fn admit(&self, token: String) -> AuthResult<Principal> {
        let claims = self.verifier.verify(&token)?;

        if self.revocations.is_revoked(&token) {
            return Err(AuthError::Revoked);
        }

        let customer = self
            .customers
            .find_by_username(&claims.subject)
            .map_err(|err| match err {
                LedgerError::NotFound => AuthError::UnknownSubject(claims.subject.clone()),
                other => AuthError::Lookup(other.to_string()),
            })?;

        debug!(customer_id = %customer.id, "request admitted");
        Ok(Principal {
            customer_id: customer.id,
            username: customer.username,
            role: claims.role,
            token,
            expires_at: claims.expires_at,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    Arc<AuthenticationGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthenticationGate>::from_ref(state);
        gate.authorize(&parts.headers).map_err(|err| {
            warn!(
                reason = err.reason(),
                path = %parts.uri.path(),
                error = %err,
                "request rejected by authentication gate"
            );
            err
        })
    }
}
