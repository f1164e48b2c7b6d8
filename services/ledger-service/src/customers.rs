use std::path::PathBuf;
use std::sync::OnceLock;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::storage::{JsonCollection, Mutation};

/// Identity record. `password_hash` always holds an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub username: String,
    /// Seed files from older deployments carried the plaintext under `password`.
    #[serde(alias = "password")]
    pub password_hash: String,
    #[serde(deserialize_with = "phone_from_text_or_number")]
    pub phone: String,
    #[serde(default)]
    pub active_token: Option<String>,
}

/// Phone numbers arrive either as JSON strings or as bare numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumber {
    Text(String),
    Number(u64),
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        match value {
            PhoneNumber::Text(text) => text,
            PhoneNumber::Number(number) => number.to_string(),
        }
    }
}

pub(crate) fn phone_from_text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    PhoneNumber::deserialize(deserializer).map(String::from)
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub username: String,
    pub password: String,
    pub phone: String,
}

/// Owns customer records and is the only writer of the customers file.
pub struct CredentialStore {
    records: JsonCollection<Customer>,
}

impl CredentialStore {
    /// Loads the store, hashing any legacy plaintext passwords found on disk.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let store = Self {
            records: JsonCollection::open(path)?,
        };
        store.upgrade_plaintext_passwords()?;
        Ok(store)
    }

    fn upgrade_plaintext_passwords(&self) -> LedgerResult<()> {
        let upgraded = self.records.update(|records| -> LedgerResult<Mutation<usize>> {
            let mut upgraded = 0usize;
            for customer in records.iter_mut() {
                if PasswordHash::new(&customer.password_hash).is_err() {
                    customer.password_hash = hash_password(&customer.password_hash)?;
                    upgraded += 1;
                }
            }
            if upgraded == 0 {
                Ok(Mutation::Unchanged(0))
            } else {
                Ok(Mutation::Changed(upgraded))
            }
        })?;

        if upgraded > 0 {
            info!(
                upgraded,
                path = %self.records.path().display(),
                "hashed legacy plaintext passwords"
            );
        }
        Ok(())
    }

    pub fn register(&self, new_customer: NewCustomer) -> LedgerResult<Customer> {
        let NewCustomer {
            name,
            username,
            password,
            phone,
        } = new_customer;

        validate_registration(&name, &username, &password)?;

        // Fail fast without paying for a hash; the authoritative check runs under the writer lock.
        if self.find_by_username(&username).is_ok() {
            return Err(LedgerError::DuplicateUsername(username));
        }

        let password_hash = hash_password(&password)?;

        self.records.update(|records| {
            if records.iter().any(|existing| existing.username == username) {
                return Err(LedgerError::DuplicateUsername(username.clone()));
            }

            let customer = Customer {
                id: next_customer_id(records),
                name,
                username,
                password_hash,
                phone,
                active_token: None,
            };
            records.push(customer.clone());
            Ok(Mutation::Changed(customer))
        })
    }

    /// Compares `password` against the stored hash in constant time.
    ///
    /// An unknown username is `NotFound`, after spending the same hashing
    /// effort as a real comparison.
    pub fn authenticate(&self, username: &str, password: &str) -> LedgerResult<bool> {
        match self.find_by_username(username) {
            Ok(customer) => Ok(verify_password(password, &customer.password_hash)),
            Err(LedgerError::NotFound) => {
                if let Some(decoy) = decoy_hash() {
                    let _ = verify_password(password, decoy);
                }
                Err(LedgerError::NotFound)
            }
            Err(other) => Err(other),
        }
    }

    pub fn assign_token(&self, username: &str, token: &str) -> LedgerResult<()> {
        self.records.update(|records| -> LedgerResult<Mutation<()>> {
            let customer = records
                .iter_mut()
                .find(|customer| customer.username == username)
                .ok_or(LedgerError::NotFound)?;
            customer.active_token = Some(token.to_string());
            Ok(Mutation::Changed(()))
        })
    }

    /// Clears `token` from whichever customer holds it. Returns whether one did.
    pub fn clear_token(&self, token: &str) -> LedgerResult<bool> {
        self.records.update(|records| {
            let mut cleared = false;
            for customer in records
                .iter_mut()
                .filter(|customer| customer.active_token.as_deref() == Some(token))
            {
                customer.active_token = None;
                cleared = true;
            }
            if cleared {
                Ok::<_, LedgerError>(Mutation::Changed(true))
            } else {
                Ok(Mutation::Unchanged(false))
            }
        })
    }

    pub fn find_by_id(&self, id: &str) -> LedgerResult<Customer> {
        self.records
            .snapshot()
            .iter()
            .find(|customer| customer.id == id)
            .cloned()
            .ok_or(LedgerError::NotFound)
    }

    pub fn find_by_username(&self, username: &str) -> LedgerResult<Customer> {
        self.records
            .snapshot()
            .iter()
            .find(|customer| customer.username == username)
            .cloned()
            .ok_or(LedgerError::NotFound)
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.records.snapshot().to_vec()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn validate_registration(name: &str, username: &str, password: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::invalid_input("name", "must not be empty"));
    }
    if username.trim().is_empty() {
        return Err(LedgerError::invalid_input("username", "must not be empty"));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(LedgerError::invalid_input(
            "username",
            "must not contain whitespace",
        ));
    }
    if password.trim().is_empty() {
        return Err(LedgerError::invalid_input("password", "must not be empty"));
    }
    Ok(())
}

/// Sequential ids continue from the highest numeric id on disk.
fn next_customer_id(records: &[Customer]) -> String {
    let highest = records
        .iter()
        .filter_map(|customer| customer.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (highest + 1).to_string()
}

fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| LedgerError::Hashing(err.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "stored password hash is not a PHC string");
            false
        }
    }
}

fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("decoy-password").ok())
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn alice() -> NewCustomer {
        NewCustomer {
            name: "Alice".to_string(),
            username: "alice".to_string(),
            password: "secret1".to_string(),
            phone: "81234".to_string(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::open(dir.path().join("customers.json")).expect("open store")
    }

    #[test]
    fn register_then_authenticate() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let customer = store.register(alice()).expect("register");
        assert_eq!(customer.id, "1");
        assert_ne!(customer.password_hash, "secret1");
        assert!(customer.password_hash.starts_with("$argon2"));
        assert!(customer.active_token.is_none());

        assert!(store.authenticate("alice", "secret1").unwrap());
        assert!(!store.authenticate("alice", "wrong").unwrap());
    }

    #[test]
    fn authenticate_unknown_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let err = store.authenticate("nobody", "secret1").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound));
    }

    #[test]
    fn usernames_are_unique_and_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.register(alice()).unwrap();

        let err = store.register(alice()).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateUsername(ref name) if name == "alice"));
        assert_eq!(store.len(), 1);

        let mut upper = alice();
        upper.username = "Alice".to_string();
        let second = store.register(upper).expect("different case is a different user");
        assert_eq!(second.id, "2");
    }

    #[test]
    fn registration_rejects_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let mut blank_password = alice();
        blank_password.password = "   ".to_string();
        let err = store.register(blank_password).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { field: "password", .. }));

        let mut spaced = alice();
        spaced.username = "al ice".to_string();
        let err = store.register(spaced).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { field: "username", .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn ids_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(&dir);
            store.register(alice()).unwrap();
        }
        let store = open_store(&dir);
        let mut bob = alice();
        bob.username = "bob".to_string();
        let customer = store.register(bob).unwrap();
        assert_eq!(customer.id, "2");
        assert!(store.authenticate("alice", "secret1").unwrap());
    }

    #[test]
    fn tokens_are_assigned_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.register(alice()).unwrap();

        store.assign_token("alice", "token-a").unwrap();
        store.assign_token("alice", "token-b").unwrap();
        assert_eq!(
            store.find_by_username("alice").unwrap().active_token.as_deref(),
            Some("token-b")
        );

        assert!(!store.clear_token("token-a").unwrap());
        assert!(store.clear_token("token-b").unwrap());
        assert!(store.find_by_id("1").unwrap().active_token.is_none());

        let err = store.assign_token("ghost", "token-c").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound));
    }

    #[test]
    fn legacy_plaintext_passwords_are_hashed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.json");
        fs::write(
            &path,
            r#"[{"id":"1","name":"Legacy","username":"legacy","password":"hunter2","phone":81234567}]"#,
        )
        .unwrap();

        let store = CredentialStore::open(&path).unwrap();
        let stored = store.find_by_username("legacy").unwrap();
        assert_ne!(stored.password_hash, "hunter2");
        assert_eq!(stored.phone, "81234567");
        assert!(store.authenticate("legacy", "hunter2").unwrap());

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("hunter2"));
        assert!(on_disk.contains("password_hash"));
    }
}
