use axum::{extract::State, http::StatusCode, Json};
use common_http_errors::{ApiError, ApiResult};
use common_money::Amount;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::{run_blocking, AppState};
use crate::error::LedgerError;
use crate::gate::Principal;
use crate::ledger::{NewTransaction, Transaction, TransactionId};

#[derive(Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub transaction_id: TransactionId,
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    pub amount: Amount,
    pub description: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
}

pub async fn process_transaction(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<TransactionRequest>,
) -> ApiResult<(StatusCode, Json<TransactionResponse>)> {
    let TransactionRequest {
        customer_id,
        merchant_id,
        amount,
        description,
    } = request;

    let customer_id = customer_id.unwrap_or_else(|| principal.customer_id.clone());
    if customer_id != principal.customer_id {
        warn!(
            caller = %principal.customer_id,
            requested = %customer_id,
            "transaction for another customer refused"
        );
        state.record_transaction_metric("forbidden");
        return Err(ApiError::Forbidden {
            code: "foreign_customer",
        });
    }

    let amount = match Amount::from_f64(amount) {
        Ok(amount) => amount,
        Err(_) => {
            state.record_transaction_metric("rejected");
            return Err(LedgerError::InvalidAmount.into());
        }
    };

    let ledger = state.ledger.clone();
    let request = NewTransaction {
        customer_id,
        merchant_id,
        amount,
        description,
    };
    let recorded = match run_blocking(move || ledger.record(request)).await? {
        Ok(recorded) => {
            state.record_transaction_metric("recorded");
            recorded
        }
        Err(err) => {
            let outcome = match err {
                LedgerError::Storage(_) => "error",
                _ => "rejected",
            };
            state.record_transaction_metric(outcome);
            return Err(err.into());
        }
    };

    let transaction = recorded.transaction;
    let message = match &recorded.merchant_name {
        Some(name) => format!("payment for {name} with amount {} success", transaction.amount),
        None => format!("transaction with amount {} success", transaction.amount),
    };

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            success: true,
            transaction_id: transaction.id,
            customer_id: transaction.customer_id,
            merchant_name: recorded.merchant_name,
            amount: transaction.amount,
            description: transaction.description,
            message,
        }),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<TransactionListResponse> {
    Json(TransactionListResponse {
        success: true,
        transactions: state.ledger.list_by_customer(&principal.customer_id),
    })
}
