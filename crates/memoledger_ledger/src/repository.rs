//! Ledger persistence on a remote store.
//!
//! Layout under the store root:
//!
//! ```text
//! customers/{customer}/transactions/{transaction}   one document per record
//! customers/{customer}/balance                      CustomerBalance aggregate
//! customers/{customer}/activity/{key}               append-only audit entries
//! ```
//!
//! Every mutation recomputes the aggregate from the full record set and writes
//! it together with the record in one `multi_write`. Mutations of one customer
//! are serialised by a per-customer lock held from the read to the write, so
//! the aggregate always matches the records it summarises.

use crate::balance::CustomerBalance;
use crate::error::{LedgerError, LedgerResult};
use crate::types::{CustomerId, Transaction, TransactionId};
use chrono::{DateTime, Utc};
use memoledger_store::{DocPath, RemoteStore, StoreError, WriteBatch};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// An audit entry recorded after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// What happened, e.g. `"add"` or `"delete"`.
    pub action: String,
    /// The record affected.
    pub transaction_id: TransactionId,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Reads and writes a customer's ledger through a [`RemoteStore`].
pub struct LedgerRepository<S: RemoteStore> {
    store: S,
    locks: Mutex<HashMap<CustomerId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: RemoteStore> LedgerRepository<S> {
    /// Creates a repository on `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive write access to `customer`'s records.
    async fn lock_customer(&self, customer: &CustomerId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().entry(customer.clone()).or_default());
        lock.lock_owned().await
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn customer_path(customer: &CustomerId) -> LedgerResult<DocPath> {
        Ok(DocPath::parse("customers")?.child(customer.as_str())?)
    }

    fn transactions_path(customer: &CustomerId) -> LedgerResult<DocPath> {
        Ok(Self::customer_path(customer)?.child("transactions")?)
    }

    fn transaction_path(customer: &CustomerId, id: &TransactionId) -> LedgerResult<DocPath> {
        Ok(Self::transactions_path(customer)?.child(id.as_str())?)
    }

    fn balance_path(customer: &CustomerId) -> LedgerResult<DocPath> {
        Ok(Self::customer_path(customer)?.child("balance")?)
    }

    /// Loads every record of `customer`, ordered by date then creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a document cannot be decoded.
    pub async fn load_transactions(&self, customer: &CustomerId) -> LedgerResult<Vec<Transaction>> {
        let path = Self::transactions_path(customer)?;
        let Some(value) = self.store.read(&path).await? else {
            return Ok(Vec::new());
        };

        let Value::Object(documents) = value else {
            return Err(LedgerError::Corrupt {
                path: path.to_string(),
                message: "expected a map of transactions".into(),
            });
        };

        let mut transactions = Vec::with_capacity(documents.len());
        for (key, document) in documents {
            let txn: Transaction =
                serde_json::from_value(document).map_err(|e| LedgerError::Corrupt {
                    path: format!("{path}/{key}"),
                    message: e.to_string(),
                })?;
            transactions.push(txn);
        }
        transactions.sort_by(|a, b| (a.date, a.created_at, &a.id).cmp(&(b.date, b.created_at, &b.id)));
        Ok(transactions)
    }

    /// Loads the stored aggregate of `customer`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the document cannot be decoded.
    pub async fn load_balance(&self, customer: &CustomerId) -> LedgerResult<Option<CustomerBalance>> {
        let path = Self::balance_path(customer)?;
        match self.store.read(&path).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| LedgerError::Corrupt {
                    path: path.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Adds a record and rewrites the customer aggregate in one batch.
    ///
    /// Safe to repeat: re-adding a record with the same id rewrites the same
    /// document and yields the same aggregate.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if the record is malformed
    /// - [`LedgerError::Conflict`] if a different sale already uses the memo
    /// - [`LedgerError::NotFound`] if a payment's memo has no sale
    /// - [`LedgerError::Store`] if the store fails
    pub async fn add_transaction(&self, txn: &Transaction) -> LedgerResult<CustomerBalance> {
        txn.validate()?;
        let customer = &txn.customer_id;
        let _guard = self.lock_customer(customer).await;

        let mut records = self.load_transactions(customer).await?;
        records.retain(|existing| existing.id != txn.id);

        let memo_has_sale = records
            .iter()
            .any(|t| t.memo_number == txn.memo_number && t.kind.is_sale());
        if txn.kind.is_sale() && memo_has_sale {
            return Err(LedgerError::Conflict(format!(
                "memo {} already has a sale",
                txn.memo_number
            )));
        }
        if !txn.kind.is_sale() && !memo_has_sale {
            return Err(LedgerError::NotFound(format!(
                "sale for memo {}",
                txn.memo_number
            )));
        }

        records.push(txn.clone());
        let balance = CustomerBalance::from_transactions(customer.clone(), &records);

        let batch = WriteBatch::new()
            .set(
                Self::transaction_path(customer, &txn.id)?,
                serde_json::to_value(txn).map_err(StoreError::from)?,
            )
            .set(
                Self::balance_path(customer)?,
                serde_json::to_value(&balance).map_err(StoreError::from)?,
            );
        self.store.multi_write(batch).await?;

        debug!(customer = %customer, id = %txn.id, due = balance.total_due, "transaction stored");
        self.record_activity(customer, "add", &txn.id).await;
        Ok(balance)
    }

    /// Deletes a record and rewrites the customer aggregate in one batch.
    ///
    /// Deleting a record that is already gone succeeds, so a retried delete
    /// whose first attempt landed does not fail.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Conflict`] if the record is a sale that still has payments
    /// - [`LedgerError::Store`] if the store fails
    pub async fn delete_transaction(
        &self,
        customer: &CustomerId,
        id: &TransactionId,
    ) -> LedgerResult<CustomerBalance> {
        let _guard = self.lock_customer(customer).await;
        let mut records = self.load_transactions(customer).await?;
        let Some(position) = records.iter().position(|t| &t.id == id) else {
            debug!(customer = %customer, id = %id, "transaction already deleted");
            return Ok(CustomerBalance::from_transactions(customer.clone(), &records));
        };

        let target = records.remove(position);
        if target.kind.is_sale()
            && records
                .iter()
                .any(|t| t.memo_number == target.memo_number && !t.kind.is_sale())
        {
            return Err(LedgerError::Conflict(format!(
                "memo {} still has payments",
                target.memo_number
            )));
        }

        let balance = CustomerBalance::from_transactions(customer.clone(), &records);
        let batch = WriteBatch::new()
            .remove(Self::transaction_path(customer, id)?)
            .set(
                Self::balance_path(customer)?,
                serde_json::to_value(&balance).map_err(StoreError::from)?,
            );
        self.store.multi_write(batch).await?;

        self.record_activity(customer, "delete", id).await;
        Ok(balance)
    }

    /// Loads the audit trail of `customer`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or an entry cannot be decoded.
    pub async fn load_activity(&self, customer: &CustomerId) -> LedgerResult<Vec<ActivityEntry>> {
        let path = Self::customer_path(customer)?.child("activity")?;
        let Some(Value::Object(entries)) = self.store.read(&path).await? else {
            return Ok(Vec::new());
        };

        // Append keys sort in insertion order.
        let mut keyed: Vec<(String, Value)> = entries.into_iter().collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value(value).map_err(|e| LedgerError::Corrupt {
                    path: format!("{path}/{key}"),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Appends an audit entry. Failures are logged and otherwise ignored: the
    /// mutation itself has already been committed.
    async fn record_activity(&self, customer: &CustomerId, action: &str, id: &TransactionId) {
        let entry = ActivityEntry {
            action: action.to_string(),
            transaction_id: id.clone(),
            at: Utc::now(),
        };
        let result = async {
            let path = Self::customer_path(customer)?.child("activity")?;
            let value = serde_json::to_value(&entry).map_err(StoreError::from)?;
            self.store.append(&path, value).await?;
            Ok::<_, LedgerError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(customer = %customer, id = %id, error = %e, "failed to record activity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use memoledger_store::{MemoryStore, StoreError, StoreResult};
    use serde_json::json;

    /// Yields to the scheduler after every read, so concurrent mutations
    /// interleave between their read and their write.
    struct YieldingStore(MemoryStore);

    #[async_trait]
    impl RemoteStore for YieldingStore {
        async fn read(&self, path: &DocPath) -> StoreResult<Option<Value>> {
            let value = self.0.read(path).await;
            tokio::task::yield_now().await;
            value
        }

        async fn write(&self, path: &DocPath, value: Value) -> StoreResult<()> {
            self.0.write(path, value).await
        }

        async fn multi_write(&self, batch: WriteBatch) -> StoreResult<()> {
            self.0.multi_write(batch).await
        }

        async fn append(&self, path: &DocPath, value: Value) -> StoreResult<String> {
            self.0.append(path, value).await
        }

        async fn delete(&self, path: &DocPath) -> StoreResult<()> {
            self.0.delete(path).await
        }
    }

    fn yielding_repo() -> LedgerRepository<YieldingStore> {
        LedgerRepository::new(YieldingStore(MemoryStore::new()))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    fn repo() -> LedgerRepository<MemoryStore> {
        LedgerRepository::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn add_sale_writes_record_and_balance() {
        let repo = repo();
        let sale = Transaction::sale("c1".into(), "M1".into(), 1000, 200, day());

        let balance = repo.add_transaction(&sale).await.unwrap();
        assert_eq!(balance.total_due, 800);

        let loaded = repo.load_transactions(&"c1".into()).await.unwrap();
        assert_eq!(loaded, vec![sale]);
        assert_eq!(
            repo.load_balance(&"c1".into()).await.unwrap(),
            Some(balance)
        );
    }

    #[tokio::test]
    async fn payment_updates_balance() {
        let repo = repo();
        repo.add_transaction(&Transaction::sale("c1".into(), "M1".into(), 1000, 200, day()))
            .await
            .unwrap();
        let balance = repo
            .add_transaction(&Transaction::payment("c1".into(), "M1".into(), 300, day()))
            .await
            .unwrap();

        assert_eq!(balance.total_paid, 500);
        assert_eq!(balance.total_due, 500);
        assert_eq!(balance.transaction_count, 2);
    }

    #[tokio::test]
    async fn payment_without_sale_is_not_found() {
        let repo = repo();
        let result = repo
            .add_transaction(&Transaction::payment("c1".into(), "M404".into(), 300, day()))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_eq!(repo.store().snapshot(), json!({}));
    }

    #[tokio::test]
    async fn second_sale_on_memo_conflicts() {
        let repo = repo();
        repo.add_transaction(&Transaction::sale("c1".into(), "M1".into(), 1000, 0, day()))
            .await
            .unwrap();
        let result = repo
            .add_transaction(&Transaction::sale("c1".into(), "M1".into(), 50, 0, day()))
            .await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    async fn re_adding_same_record_is_idempotent() {
        let repo = repo();
        let sale = Transaction::sale("c1".into(), "M1".into(), 1000, 100, day());

        let first = repo.add_transaction(&sale).await.unwrap();
        let second = repo.add_transaction(&sale).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.load_transactions(&"c1".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_record_never_touches_store() {
        let repo = repo();
        let bad = Transaction::sale("c1".into(), "M1".into(), -1, 0, day());
        assert!(matches!(
            repo.add_transaction(&bad).await,
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(repo.store().call_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_leaves_no_state() {
        let repo = repo();
        let sale = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        repo.store().set_available(false);

        let result = repo.add_transaction(&sale).await;
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(repo.store().snapshot(), json!({}));
    }

    #[tokio::test]
    async fn delete_recomputes_balance() {
        let repo = repo();
        let customer: CustomerId = "c1".into();
        let first = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        let second = Transaction::sale("c1".into(), "M2".into(), 500, 0, day());
        repo.add_transaction(&first).await.unwrap();
        repo.add_transaction(&second).await.unwrap();

        let balance = repo.delete_transaction(&customer, &first.id).await.unwrap();
        assert_eq!(balance.total_due, 500);
        assert_eq!(
            repo.load_transactions(&customer).await.unwrap(),
            vec![second]
        );

        // Deleting again succeeds and changes nothing.
        let again = repo.delete_transaction(&customer, &first.id).await.unwrap();
        assert_eq!(again, balance);
    }

    #[tokio::test]
    async fn deleting_sale_with_payments_conflicts() {
        let repo = repo();
        let sale = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        repo.add_transaction(&sale).await.unwrap();
        repo.add_transaction(&Transaction::payment("c1".into(), "M1".into(), 100, day()))
            .await
            .unwrap();

        let result = repo.delete_transaction(&"c1".into(), &sale.id).await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    async fn activity_is_recorded_in_order() {
        let repo = repo();
        let customer: CustomerId = "c1".into();
        let sale = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        repo.add_transaction(&sale).await.unwrap();
        repo.delete_transaction(&customer, &sale.id).await.unwrap();

        let activity = repo.load_activity(&customer).await.unwrap();
        let actions: Vec<&str> = activity.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["add", "delete"]);
        assert!(activity.iter().all(|a| a.transaction_id == sale.id));
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let store = MemoryStore::with_root(json!({
            "customers": {"c1": {"transactions": {"t1": {"type": "refund"}}}}
        }));
        let repo = LedgerRepository::new(store);
        let result = repo.load_transactions(&"c1".into()).await;
        assert!(matches!(result, Err(LedgerError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn invalid_customer_id_is_rejected_by_path() {
        let repo = repo();
        let result = repo.load_transactions(&"bad.id".into()).await;
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::InvalidPath { .. }))
        ));
    }

    #[tokio::test]
    async fn concurrent_adds_keep_balance_consistent() {
        let repo = yielding_repo();
        let customer: CustomerId = "c1".into();
        let first = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        let second = Transaction::sale("c1".into(), "M2".into(), 500, 0, day());

        let (a, b) = tokio::join!(repo.add_transaction(&first), repo.add_transaction(&second));
        a.unwrap();
        b.unwrap();

        let records = repo.load_transactions(&customer).await.unwrap();
        let stored = repo.load_balance(&customer).await.unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(stored, CustomerBalance::from_transactions(customer, &records));
        assert_eq!(stored.total_due, 1500);
        assert_eq!(stored.memo_count, 2);
    }

    #[tokio::test]
    async fn concurrent_sales_on_one_memo_conflict() {
        let repo = yielding_repo();
        let first = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        let second = Transaction::sale("c1".into(), "M1".into(), 700, 0, day());

        let (a, b) = tokio::join!(repo.add_transaction(&first), repo.add_transaction(&second));

        assert!(a.is_ok());
        assert!(matches!(b, Err(LedgerError::Conflict(_))));
        let records = repo.load_transactions(&"c1".into()).await.unwrap();
        assert_eq!(records, vec![first]);
    }

    #[tokio::test]
    async fn concurrent_add_and_delete_keep_balance_consistent() {
        let repo = yielding_repo();
        let customer: CustomerId = "c1".into();
        let old = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        repo.add_transaction(&old).await.unwrap();
        let new = Transaction::sale("c1".into(), "M2".into(), 300, 0, day());

        let (a, b) = tokio::join!(
            repo.delete_transaction(&customer, &old.id),
            repo.add_transaction(&new)
        );
        a.unwrap();
        b.unwrap();

        let stored = repo.load_balance(&customer).await.unwrap().unwrap();
        assert_eq!(repo.load_transactions(&customer).await.unwrap(), vec![new]);
        assert_eq!(stored.total_due, 300);
        assert_eq!(stored.transaction_count, 1);
    }

    #[tokio::test]
    async fn other_customers_are_not_serialised() {
        let repo = yielding_repo();
        let first = Transaction::sale("c1".into(), "M1".into(), 1000, 0, day());
        let second = Transaction::sale("c2".into(), "M1".into(), 500, 0, day());

        let (a, b) = tokio::join!(repo.add_transaction(&first), repo.add_transaction(&second));

        assert_eq!(a.unwrap().total_due, 1000);
        assert_eq!(b.unwrap().total_due, 500);
        assert_eq!(repo.locks.lock().len(), 2);
    }
}
