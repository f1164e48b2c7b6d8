use std::sync::Arc;

use common_auth::{IssuedToken, TokenSigner, ROLE_CUSTOMER};
use tracing::{error, info, warn};

use crate::customers::{CredentialStore, Customer, NewCustomer};
use crate::error::{LedgerError, LedgerResult};
use crate::revocation::RevocationList;

/// Registration, login and logout flows over the credential store.
pub struct SessionManager {
    customers: Arc<CredentialStore>,
    revocations: Arc<RevocationList>,
    signer: Arc<TokenSigner>,
}

impl SessionManager {
    pub fn new(
        customers: Arc<CredentialStore>,
        revocations: Arc<RevocationList>,
        signer: Arc<TokenSigner>,
    ) -> Self {
        Self {
            customers,
            revocations,
            signer,
        }
    }

    pub fn register(&self, new_customer: NewCustomer) -> LedgerResult<Customer> {
        let customer = self.customers.register(new_customer)?;
        info!(customer_id = %customer.id, username = %customer.username, "customer registered");
        Ok(customer)
    }

    /// Issues a token for valid credentials and records it as the active session.
    ///
    /// Unknown usernames and wrong passwords both surface as `InvalidCredential`.
    pub fn login(&self, username: &str, password: &str) -> LedgerResult<IssuedToken> {
        match self.customers.authenticate(username, password) {
            Ok(true) => {}
            Ok(false) => {
                warn!(username, "login rejected: wrong password");
                return Err(LedgerError::InvalidCredential);
            }
            Err(LedgerError::NotFound) => {
                warn!(username, "login rejected: unknown username");
                return Err(LedgerError::InvalidCredential);
            }
            Err(other) => return Err(other),
        }

        let issued = self.signer.issue(username, ROLE_CUSTOMER)?;
        self.customers.assign_token(username, &issued.token)?;
        info!(username, expires_at = %issued.expires_at, "login succeeded");
        Ok(issued)
    }

    /// Revokes the token, then clears the session from its customer.
    ///
    /// A failed revocation leaves the session untouched, so the token is never
    /// half logged out while still passing the gate.
    pub fn logout(&self, token: &str) -> LedgerResult<()> {
        let newly_revoked = self.revocations.revoke(token)?;
        let cleared = self.customers.clear_token(token).map_err(|err| {
            error!(error = %err, "token revoked but session could not be cleared");
            err
        })?;
        info!(cleared, newly_revoked, "logout completed");
        Ok(())
    }
}
