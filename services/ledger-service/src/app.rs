use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{FromRef, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use common_auth::{JwtVerifier, TokenSigner};
use common_http_errors::ApiError;
use tracing::{error, info};

use crate::config::LedgerConfig;
use crate::customer_handlers::{login_customer, logout_customer, register_customer};
use crate::customers::CredentialStore;
use crate::gate::AuthenticationGate;
use crate::ledger::TransactionLedger;
use crate::merchants::{MerchantCatalog, StaticMerchantCatalog};
use crate::metrics::LedgerMetrics;
use crate::revocation::RevocationList;
use crate::sessions::SessionManager;
use crate::transaction_handlers::{list_transactions, process_transaction};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub ledger: Arc<TransactionLedger>,
    pub gate: Arc<AuthenticationGate>,
    pub config: Arc<LedgerConfig>,
    pub metrics: Arc<LedgerMetrics>,
}

impl FromRef<AppState> for Arc<AuthenticationGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl AppState {
    /// Opens every durable collection named by `config` and wires the components.
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        let customers = Arc::new(
            CredentialStore::open(&config.customers_path).with_context(|| {
                format!("Failed to open customers at {}", config.customers_path.display())
            })?,
        );
        let revocations = Arc::new(
            RevocationList::open(&config.revocations_path, config.revocation_match).with_context(
                || {
                    format!(
                        "Failed to open revocation list at {}",
                        config.revocations_path.display()
                    )
                },
            )?,
        );
        let merchants: Arc<dyn MerchantCatalog> = Arc::new(
            StaticMerchantCatalog::load(&config.merchants_path).with_context(|| {
                format!(
                    "Failed to load merchant catalog at {}",
                    config.merchants_path.display()
                )
            })?,
        );
        let ledger = Arc::new(
            TransactionLedger::open(
                &config.transactions_path,
                customers.clone(),
                merchants,
            )
            .with_context(|| {
                format!(
                    "Failed to open transactions at {}",
                    config.transactions_path.display()
                )
            })?,
        );

        let jwt_config = config.jwt_config();
        let signer = Arc::new(
            TokenSigner::new(jwt_config.clone()).context("Failed to initialise token signer")?,
        );
        let verifier = Arc::new(JwtVerifier::new(jwt_config));

        let sessions = Arc::new(SessionManager::new(
            customers.clone(),
            revocations.clone(),
            signer,
        ));
        let gate = Arc::new(AuthenticationGate::new(verifier, revocations, customers));

        info!(
            customers = %config.customers_path.display(),
            transactions = %config.transactions_path.display(),
            revocation_match = %config.revocation_match,
            "ledger state loaded"
        );

        Ok(Self {
            sessions,
            ledger,
            gate,
            config: Arc::new(config),
            metrics: Arc::new(LedgerMetrics::new()?),
        })
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    pub fn record_transaction_metric(&self, outcome: &str) {
        self.metrics.transaction(outcome);
    }
}

/// Runs a synchronous core operation off the async executor.
///
/// Password hashing and file persistence block, so handlers never call them inline.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        error!(error = ?err, "Blocking task failed");
        ApiError::internal("The request could not be completed.")
    })
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = ?err, "Failed to render metrics");
            ApiError::internal("metrics unavailable").into_response()
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .route("/register", post(register_customer))
        .route("/login", post(login_customer))
        .route("/customer/logout", post(logout_customer))
        .route(
            "/transaction",
            post(process_transaction).get(list_transactions),
        )
        .with_state(state)
}
