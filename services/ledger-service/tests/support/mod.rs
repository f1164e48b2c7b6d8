#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ledger_service::{build_router, AppState, LedgerConfig};
use serde_json::Value;
use std::fs;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

const MERCHANTS: &str = r#"[
  {"id": "m-001", "name": "Kopi Kenangan"},
  {"id": "m-002", "name": "Warung Sate"}
]"#;

/// A fully wired service over a throwaway data directory.
pub struct TestLedger {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestLedger {
    pub fn setup() -> Result<Self> {
        let dir = tempdir()?;
        fs::write(dir.path().join("merchants.json"), MERCHANTS)
            .context("failed to seed merchant catalog")?;
        let config = LedgerConfig::with_data_dir(TEST_SECRET, dir.path());
        let state = AppState::from_config(config)?;
        Ok(Self { dir, state })
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, json))
    }

    /// Registers `username` with password `secret1` and returns the new customer id.
    pub async fn register(&self, name: &str, username: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/register",
                None,
                Some(serde_json::json!({
                    "name": name,
                    "username": username,
                    "password": "secret1",
                    "phone": 81234567,
                })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");
        body["id"]
            .as_str()
            .map(str::to_string)
            .context("register response missing id")
    }

    pub async fn login(&self, username: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/login",
                None,
                Some(serde_json::json!({ "username": username, "password": "secret1" })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response missing token")
    }
}
