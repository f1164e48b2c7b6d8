use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

use crate::app::{run_blocking, AppState};
use crate::customers::{Customer, NewCustomer, PhoneNumber};
use crate::error::LedgerError;
use crate::gate::Principal;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    pub phone: PhoneNumber,
}

/// Public projection of a customer; never carries the password hash or session.
#[derive(Debug, Serialize)]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    pub username: String,
    pub phone: String,
}

impl From<Customer> for CustomerView {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            username: customer.username,
            phone: customer.phone,
        }
    }
}

pub async fn register_customer(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    let RegisterRequest {
        name,
        username,
        password,
        phone,
    } = request;
    let new_customer = NewCustomer {
        name,
        username,
        password,
        phone: phone.into(),
    };

    let sessions = state.sessions.clone();
    let customer = run_blocking(move || sessions.register(new_customer)).await??;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub username: String,
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

pub async fn login_customer(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let LoginRequest { username, password } = login;

    let sessions = state.sessions.clone();
    let attempt_username = username.clone();
    let outcome = run_blocking(move || sessions.login(&attempt_username, &password)).await?;

    let issued = match outcome {
        Ok(issued) => {
            state.record_login_metric("success");
            issued
        }
        Err(LedgerError::InvalidCredential) => {
            state.record_login_metric("rejected");
            return Err(ApiError::Unauthorized);
        }
        Err(err) => {
            state.record_login_metric("error");
            return Err(err.into());
        }
    };

    Ok(Json(LoginResponse {
        success: true,
        username,
        token: issued.token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        expires_at: issued.expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: &'static str,
}

pub async fn logout_customer(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<LogoutResponse>> {
    let sessions = state.sessions.clone();
    let token = principal.token;
    run_blocking(move || sessions.logout(&token)).await??;

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully.",
    }))
}
