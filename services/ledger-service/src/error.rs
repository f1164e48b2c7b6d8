use common_auth::AuthError;
use common_http_errors::ApiError;
use thiserror::Error;

use crate::storage::StorageError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("record not found")]
    NotFound,
    #[error("username '{0}' is already registered")]
    DuplicateUsername(String),
    #[error("invalid username or password")]
    InvalidCredential,
    #[error("customer '{0}' does not exist")]
    InvalidCustomer(String),
    #[error("merchant '{0}' is not in the catalog")]
    InvalidCounterparty(String),
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("invalid {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },
    #[error("failed to hash password: {0}")]
    Hashing(String),
    #[error("failed to issue token: {0}")]
    TokenIssue(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub(crate) fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound => ApiError::NotFound { code: "not_found" },
            LedgerError::DuplicateUsername(_) => {
                ApiError::conflict("duplicate_username", value.to_string())
            }
            LedgerError::InvalidCredential => ApiError::Unauthorized,
            LedgerError::InvalidCustomer(_) => {
                ApiError::bad_request("invalid_customer", value.to_string())
            }
            LedgerError::InvalidCounterparty(_) => {
                ApiError::bad_request("invalid_merchant", value.to_string())
            }
            LedgerError::InvalidAmount => ApiError::bad_request("invalid_amount", value.to_string()),
            LedgerError::InvalidInput { .. } => {
                ApiError::bad_request("invalid_input", value.to_string())
            }
            LedgerError::Hashing(_) | LedgerError::TokenIssue(_) | LedgerError::Storage(_) => {
                ApiError::Internal {
                    message: Some("The request could not be completed.".to_string()),
                }
            }
        }
    }
}
