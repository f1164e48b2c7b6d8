use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common_money::Amount;
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::customers::CredentialStore;
use crate::error::{LedgerError, LedgerResult};
use crate::merchants::MerchantCatalog;
use crate::storage::{JsonCollection, Mutation};

/// Nanoseconds since the Unix epoch at creation, bumped past the previous id
/// when the clock has not advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(i64);

/// Older ledger files stored the id as a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TransactionIdRepr {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match TransactionIdRepr::deserialize(deserializer)? {
            TransactionIdRepr::Number(value) => Ok(TransactionId(value)),
            TransactionIdRepr::Text(text) => text
                .trim()
                .parse()
                .map(TransactionId)
                .map_err(|_| de::Error::custom(format!("invalid transaction id '{text}'"))),
        }
    }
}

impl TransactionId {
    pub fn value(self) -> i64 {
        self.0
    }

    pub fn created_at(self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }

    fn next(last: Option<TransactionId>, now: DateTime<Utc>) -> Self {
        let candidate = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        match last {
            Some(TransactionId(previous)) if previous >= candidate => {
                TransactionId(previous.saturating_add(1))
            }
            _ => TransactionId(candidate),
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: String,
    #[serde(default)]
    pub merchant_id: Option<String>,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub customer_id: String,
    pub merchant_id: Option<String>,
    pub amount: Amount,
    pub description: Option<String>,
}

/// A persisted transaction together with the resolved merchant name.
#[derive(Debug, Clone)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub merchant_name: Option<String>,
}

/// Append-only ledger; the only writer of the transactions file.
pub struct TransactionLedger {
    records: JsonCollection<Transaction>,
    customers: Arc<CredentialStore>,
    merchants: Arc<dyn MerchantCatalog>,
}

impl TransactionLedger {
    pub fn open(
        path: impl Into<PathBuf>,
        customers: Arc<CredentialStore>,
        merchants: Arc<dyn MerchantCatalog>,
    ) -> LedgerResult<Self> {
        Ok(Self {
            records: JsonCollection::open(path)?,
            customers,
            merchants,
        })
    }

    /// Validates and durably appends a transaction.
    ///
    /// Checks run in order: customer, counterparty, amount, then the
    /// description of a merchant-less entry. Nothing is written unless all pass.
    pub fn record(&self, request: NewTransaction) -> LedgerResult<RecordedTransaction> {
        let NewTransaction {
            customer_id,
            merchant_id,
            amount,
            description,
        } = request;

        if self.customers.find_by_id(&customer_id).is_err() {
            return Err(LedgerError::InvalidCustomer(customer_id));
        }

        let merchant = match merchant_id.as_deref() {
            Some(reference) => Some(
                self.merchants
                    .resolve(reference)
                    .ok_or_else(|| LedgerError::InvalidCounterparty(reference.to_string()))?,
            ),
            None => None,
        };

        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let description = match (&merchant, description) {
            (_, Some(text)) => text,
            (Some(merchant), None) => format!("payment to {}", merchant.name),
            (None, None) => {
                return Err(LedgerError::invalid_input(
                    "description",
                    "required when no merchant is given",
                ))
            }
        };

        let transaction = self.records.update(|records| {
            let last = records.iter().map(|existing| existing.id).max();
            let transaction = Transaction {
                id: TransactionId::next(last, Utc::now()),
                customer_id,
                merchant_id,
                amount,
                description,
            };
            records.push(transaction.clone());
            Ok::<_, LedgerError>(Mutation::Changed(transaction))
        })?;

        info!(
            transaction_id = %transaction.id,
            customer_id = %transaction.customer_id,
            amount = %transaction.amount,
            "transaction recorded"
        );

        Ok(RecordedTransaction {
            transaction,
            merchant_name: merchant.map(|merchant| merchant.name),
        })
    }

    /// Every transaction of `customer_id`, in insertion order.
    pub fn list_by_customer(&self, customer_id: &str) -> Vec<Transaction> {
        self.records
            .snapshot()
            .iter()
            .filter(|transaction| transaction.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customers::NewCustomer;
    use crate::merchants::{Merchant, StaticMerchantCatalog};
    use std::str::FromStr;

    struct Fixture {
        _dir: tempfile::TempDir,
        ledger: TransactionLedger,
        alice_id: String,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let customers =
            Arc::new(CredentialStore::open(dir.path().join("customers.json")).unwrap());
        let alice = customers
            .register(NewCustomer {
                name: "Alice".into(),
                username: "alice".into(),
                password: "secret1".into(),
                phone: "81234".into(),
            })
            .unwrap();
        let merchants = Arc::new(StaticMerchantCatalog::new([Merchant {
            id: "m-1".into(),
            name: "Coffee Corner".into(),
        }]));
        let ledger =
            TransactionLedger::open(dir.path().join("transactions.json"), customers, merchants)
                .unwrap();
        Fixture {
            _dir: dir,
            ledger,
            alice_id: alice.id,
        }
    }

    fn payment(customer_id: &str, amount: &str) -> NewTransaction {
        NewTransaction {
            customer_id: customer_id.to_string(),
            merchant_id: Some("m-1".to_string()),
            amount: Amount::from_str(amount).unwrap(),
            description: None,
        }
    }

    #[test]
    fn records_merchant_payment_with_default_description() {
        let fx = fixture();
        let recorded = fx.ledger.record(payment(&fx.alice_id, "12.50")).unwrap();

        assert_eq!(recorded.merchant_name.as_deref(), Some("Coffee Corner"));
        assert_eq!(recorded.transaction.description, "payment to Coffee Corner");
        assert_eq!(recorded.transaction.amount.to_string(), "12.50");
        assert_eq!(fx.ledger.list_by_customer(&fx.alice_id), vec![recorded.transaction]);
    }

    #[test]
    fn unknown_customer_is_rejected() {
        let fx = fixture();
        let err = fx.ledger.record(payment("999", "10")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCustomer(ref id) if id == "999"));
        assert!(fx.ledger.is_empty());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let fx = fixture();
        for amount in ["-5", "0", "0.001"] {
            let err = fx.ledger.record(payment(&fx.alice_id, amount)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount), "amount {amount}");
        }
        assert_eq!(fx.ledger.len(), 0);
    }

    #[test]
    fn unknown_merchant_is_rejected() {
        let fx = fixture();
        let mut request = payment(&fx.alice_id, "3");
        request.merchant_id = Some("m-404".into());
        let err = fx.ledger.record(request).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCounterparty(_)));
        assert!(fx.ledger.is_empty());
    }

    #[test]
    fn customer_check_runs_before_amount_check() {
        let fx = fixture();
        let err = fx.ledger.record(payment("999", "-1")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCustomer(_)));
    }

    #[test]
    fn negative_amount_without_merchant_is_an_amount_error() {
        let fx = fixture();
        let mut request = payment(&fx.alice_id, "-5");
        request.merchant_id = None;
        let err = fx.ledger.record(request).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount), "{err:?}");
        assert!(fx.ledger.is_empty());
    }

    #[test]
    fn legacy_files_with_string_ids_and_float_amounts_load() {
        let dir = tempfile::tempdir().unwrap();
        let customers =
            Arc::new(CredentialStore::open(dir.path().join("customers.json")).unwrap());
        let alice = customers
            .register(NewCustomer {
                name: "Alice".into(),
                username: "alice".into(),
                password: "secret1".into(),
                phone: "81234".into(),
            })
            .unwrap();
        let path = dir.path().join("transactions.json");
        std::fs::write(
            &path,
            format!(
                r#"[{{"id":"1690000000000000000","customer_id":"{}","merchant_id":"m-1","amount":10.5,"description":"legacy"}}]"#,
                alice.id
            ),
        )
        .unwrap();

        let ledger = TransactionLedger::open(
            &path,
            customers,
            Arc::new(StaticMerchantCatalog::new([Merchant {
                id: "m-1".into(),
                name: "Coffee Corner".into(),
            }])),
        )
        .unwrap();

        let loaded = ledger.list_by_customer(&alice.id);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.value(), 1_690_000_000_000_000_000);
        assert_eq!(loaded[0].amount.to_string(), "10.50");

        let next = ledger.record(payment(&alice.id, "1")).unwrap();
        assert!(next.transaction.id > loaded[0].id);
    }

    #[test]
    fn malformed_string_ids_are_rejected() {
        let err = serde_json::from_str::<TransactionId>(r#""tx-1""#).unwrap_err();
        assert!(err.to_string().contains("tx-1"));
        let id: TransactionId = serde_json::from_str("42").unwrap();
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn free_form_entries_need_a_description() {
        let fx = fixture();
        let mut request = payment(&fx.alice_id, "4");
        request.merchant_id = None;
        request.description = Some("  ".into());
        let err = fx.ledger.record(request.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { field: "description", .. }));

        request.description = Some("rent share".into());
        let recorded = fx.ledger.record(request).unwrap();
        assert_eq!(recorded.transaction.description, "rent share");
        assert!(recorded.merchant_name.is_none());
    }

    #[test]
    fn ids_strictly_increase_in_file_order() {
        let fx = fixture();
        for _ in 0..20 {
            fx.ledger.record(payment(&fx.alice_id, "1")).unwrap();
        }
        let ids: Vec<_> = fx
            .ledger
            .list_by_customer(&fx.alice_id)
            .iter()
            .map(|tx| tx.id)
            .collect();
        assert_eq!(ids.len(), 20);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn next_id_bumps_past_a_stalled_clock() {
        let now = Utc::now();
        let first = TransactionId::next(None, now);
        let second = TransactionId::next(Some(first), now);
        assert_eq!(second.value(), first.value() + 1);
        assert_eq!(first.created_at().timestamp_nanos_opt(), now.timestamp_nanos_opt());
    }
}
