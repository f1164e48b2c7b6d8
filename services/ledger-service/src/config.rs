use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::revocation::RevocationMatch;

const DEFAULT_DATA_DIR: &str = "json";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;
const MAX_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 3600;
const DEFAULT_ISSUER: &str = "ledger-service";
const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct LedgerConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl_seconds: i64,
    pub customers_path: PathBuf,
    pub revocations_path: PathBuf,
    pub transactions_path: PathBuf,
    pub merchants_path: PathBuf,
    pub revocation_match: RevocationMatch,
    pub allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl LedgerConfig {
    /// Defaults for everything but the secret, with every file under `data_dir`.
    pub fn with_data_dir(jwt_secret: impl Into<String>, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            customers_path: data_dir.join("customers.json"),
            revocations_path: data_dir.join("blacklist_token.json"),
            transactions_path: data_dir.join("transactions.json"),
            merchants_path: data_dir.join("merchants.json"),
            revocation_match: RevocationMatch::default(),
            allowed_origins: default_origins(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.jwt_secret.clone(), self.jwt_issuer.clone())
            .with_ttl(self.token_ttl_seconds)
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let jwt_secret = var("LEDGER_JWT_SECRET")
            .ok_or_else(|| anyhow!("LEDGER_JWT_SECRET must be set to a non-empty value"))?;

        let data_dir = var("LEDGER_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::with_data_dir(jwt_secret, &data_dir);

        if let Some(issuer) = var("LEDGER_JWT_ISSUER") {
            config.jwt_issuer = issuer;
        }

        if let Some(raw) = var("LEDGER_TOKEN_TTL_SECONDS") {
            let ttl: i64 = raw
                .parse()
                .with_context(|| format!("Failed to parse LEDGER_TOKEN_TTL_SECONDS '{raw}'"))?;
            if ttl <= 0 || ttl > MAX_TOKEN_TTL_SECONDS {
                return Err(anyhow!(
                    "LEDGER_TOKEN_TTL_SECONDS must be between 1 and {MAX_TOKEN_TTL_SECONDS}, got {ttl}"
                ));
            }
            config.token_ttl_seconds = ttl;
        }

        if let Some(path) = var("LEDGER_CUSTOMERS_PATH") {
            config.customers_path = PathBuf::from(path);
        }
        if let Some(path) = var("LEDGER_REVOCATIONS_PATH") {
            config.revocations_path = PathBuf::from(path);
        }
        if let Some(path) = var("LEDGER_TRANSACTIONS_PATH") {
            config.transactions_path = PathBuf::from(path);
        }
        if let Some(path) = var("LEDGER_MERCHANTS_PATH") {
            config.merchants_path = PathBuf::from(path);
        }

        if let Some(raw) = var("LEDGER_REVOCATION_MATCH") {
            config.revocation_match = raw
                .parse()
                .map_err(|err: String| anyhow!(err))
                .context("Failed to parse LEDGER_REVOCATION_MATCH")?;
        }

        if let Some(raw) = var("LEDGER_CORS_ORIGINS") {
            config.allowed_origins = parse_list(&raw);
        }

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(raw) = var("PORT") {
            config.port = raw
                .parse()
                .with_context(|| format!("Failed to parse PORT '{raw}'"))?;
        }

        Ok(config)
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("customers_path", &self.customers_path)
            .field("revocations_path", &self.revocations_path)
            .field("transactions_path", &self.transactions_path)
            .field("merchants_path", &self.merchants_path)
            .field("revocation_match", &self.revocation_match)
            .field("allowed_origins", &self.allowed_origins)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

pub fn load_ledger_config() -> Result<LedgerConfig> {
    LedgerConfig::from_lookup(|key| env::var(key).ok())
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
