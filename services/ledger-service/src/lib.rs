pub mod app;
pub mod config;
pub mod customer_handlers;
pub mod customers;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod merchants;
pub mod metrics;
pub mod revocation;
pub mod sessions;
pub mod storage;
pub mod transaction_handlers;

pub use app::{build_router, AppState};
pub use config::{load_ledger_config, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use gate::{AuthenticationGate, Principal};
