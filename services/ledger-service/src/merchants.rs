use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::{read_json_array, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
}

/// Read-only lookup of transaction counterparties.
pub trait MerchantCatalog: Send + Sync {
    fn resolve(&self, merchant_id: &str) -> Option<Merchant>;
}

/// Catalog loaded once from a JSON array of `{id, name}` objects.
#[derive(Debug, Default)]
pub struct StaticMerchantCatalog {
    merchants: HashMap<String, Merchant>,
}

impl StaticMerchantCatalog {
    pub fn new(merchants: impl IntoIterator<Item = Merchant>) -> Self {
        Self {
            merchants: merchants
                .into_iter()
                .map(|merchant| (merchant.id.clone(), merchant))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let merchants: Vec<Merchant> = read_json_array(path)?;
        Ok(Self::new(merchants))
    }

    pub fn len(&self) -> usize {
        self.merchants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
    }
}

impl MerchantCatalog for StaticMerchantCatalog {
    fn resolve(&self, merchant_id: &str) -> Option<Merchant> {
        self.merchants.get(merchant_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merchants.json");
        std::fs::write(
            &path,
            r#"[{"id":"m-1","name":"Coffee Corner"},{"id":"m-2","name":"Book Nook"}]"#,
        )
        .unwrap();

        let catalog = StaticMerchantCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve("m-2").map(|m| m.name), Some("Book Nook".to_string()));
        assert!(catalog.resolve("m-3").is_none());
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticMerchantCatalog::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StorageError::Read { .. }));
    }
}
