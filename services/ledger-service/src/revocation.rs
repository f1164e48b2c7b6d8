use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::storage::{JsonCollection, Mutation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub token: String,
}

/// How a presented token is compared against revoked entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevocationMatch {
    /// The presented token must equal a revoked token.
    #[default]
    Exact,
    /// Legacy behaviour: the presented token starts with a revoked token.
    Prefix,
}

impl RevocationMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationMatch::Exact => "exact",
            RevocationMatch::Prefix => "prefix",
        }
    }

    fn matches(&self, presented: &str, revoked: &str) -> bool {
        match self {
            RevocationMatch::Exact => presented == revoked,
            RevocationMatch::Prefix => !revoked.is_empty() && presented.starts_with(revoked),
        }
    }
}

impl FromStr for RevocationMatch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(RevocationMatch::Exact),
            "prefix" => Ok(RevocationMatch::Prefix),
            other => Err(format!(
                "Unsupported revocation match policy '{other}'. Use exact or prefix."
            )),
        }
    }
}

impl fmt::Display for RevocationMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable, append-only set of tokens that must never be admitted again.
pub struct RevocationList {
    entries: JsonCollection<RevocationEntry>,
    policy: RevocationMatch,
}

impl RevocationList {
    pub fn open(path: impl Into<PathBuf>, policy: RevocationMatch) -> LedgerResult<Self> {
        Ok(Self {
            entries: JsonCollection::open(path)?,
            policy,
        })
    }

    pub fn policy(&self) -> RevocationMatch {
        self.policy
    }

    /// Records `token` as revoked. Returns false when it already was.
    pub fn revoke(&self, token: &str) -> LedgerResult<bool> {
        if token.is_empty() {
            return Err(LedgerError::invalid_input("token", "must not be empty"));
        }

        let added = self.entries.update(|entries| {
            if entries.iter().any(|entry| entry.token == token) {
                return Ok::<_, LedgerError>(Mutation::Unchanged(false));
            }
            entries.push(RevocationEntry {
                token: token.to_string(),
            });
            Ok(Mutation::Changed(true))
        })?;

        if added {
            info!(revoked = self.entries.len(), "token revoked");
        }
        Ok(added)
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries
            .snapshot()
            .iter()
            .any(|entry| self.policy.matches(token, &entry.token))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
