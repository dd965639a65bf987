//! The ledger client.

use crate::error::{ClientError, ClientResult};
use chrono::NaiveDate;
use memoledger_ledger::{
    group_by_memo, running_balance, Amount, CustomerBalance, CustomerId, DateRange,
    LedgerRepository, MemoGroup, MemoNumber, StatementLine, Transaction, TransactionId,
};
use memoledger_store::RemoteStore;
use memoledger_sync::{
    AtomicOperationCoordinator, CoordinatorError, ExecuteOptions, Hook, OperationError,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Cache = Arc<RwLock<HashMap<CustomerId, Vec<Transaction>>>>;

/// Input for [`LedgerClient::record_sale`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    /// Customer billed.
    pub customer_id: CustomerId,
    /// Memo the sale opens.
    pub memo_number: MemoNumber,
    /// Billed total.
    pub total: Amount,
    /// Paid at the counter.
    pub deposit: Amount,
    /// Business date.
    pub date: NaiveDate,
    /// Optional note.
    pub note: Option<String>,
}

/// Input for [`LedgerClient::record_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Customer paying.
    pub customer_id: CustomerId,
    /// Memo paid against.
    pub memo_number: MemoNumber,
    /// Amount paid.
    pub amount: Amount,
    /// Business date.
    pub date: NaiveDate,
    /// Optional note.
    pub note: Option<String>,
}

/// Whether a write has reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Committed; carries the customer's aggregate after the write.
    Synced(CustomerBalance),
    /// Applied locally and queued until the store is reachable.
    Pending,
}

impl SyncStatus {
    /// Returns true if the write is waiting in the offline queue.
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncStatus::Pending)
    }
}

/// A recorded sale or payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    /// The record as written, with its generated id.
    pub transaction: Transaction,
    /// Whether it reached the store.
    pub status: SyncStatus,
}

/// Records sales and payments through the coordinator and keeps an
/// optimistic per-customer cache for reconciliation views.
pub struct LedgerClient<S: RemoteStore + 'static> {
    coordinator: Arc<AtomicOperationCoordinator>,
    repository: Arc<LedgerRepository<S>>,
    cache: Cache,
}

impl<S: RemoteStore + 'static> LedgerClient<S> {
    /// Creates a client.
    pub fn new(
        coordinator: Arc<AtomicOperationCoordinator>,
        repository: Arc<LedgerRepository<S>>,
    ) -> Self {
        Self {
            coordinator,
            repository,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<AtomicOperationCoordinator> {
        &self.coordinator
    }

    /// Returns the repository.
    pub fn repository(&self) -> &Arc<LedgerRepository<S>> {
        &self.repository
    }

    /// Records a sale.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Ledger`] if the input is malformed; nothing is queued
    /// - [`ClientError::Operation`] if the store rejects the sale
    pub async fn record_sale(&self, sale: NewSale) -> ClientResult<Recorded> {
        let mut txn = Transaction::sale(
            sale.customer_id,
            sale.memo_number,
            sale.total,
            sale.deposit,
            sale.date,
        );
        txn.note = sale.note;
        self.record("recordSale", txn).await
    }

    /// Records a payment against an existing memo.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Ledger`] if the input is malformed; nothing is queued
    /// - [`ClientError::Operation`] if the store rejects the payment, e.g.
    ///   because the memo has no sale
    pub async fn record_payment(&self, payment: NewPayment) -> ClientResult<Recorded> {
        let mut txn = Transaction::payment(
            payment.customer_id,
            payment.memo_number,
            payment.amount,
            payment.date,
        );
        txn.note = payment.note;
        self.record("recordPayment", txn).await
    }

    async fn record(&self, name: &str, txn: Transaction) -> ClientResult<Recorded> {
        txn.validate()?;

        let update = {
            let cache = Arc::clone(&self.cache);
            let txn = txn.clone();
            Hook::infallible(move || upsert(&cache, &txn))
        };
        let rollback = {
            let cache = Arc::clone(&self.cache);
            let (customer, id) = (txn.customer_id.clone(), txn.id.clone());
            Hook::infallible(move || remove(&cache, &customer, &id))
        };
        let run = {
            let repository = Arc::clone(&self.repository);
            let txn = txn.clone();
            move || {
                let repository = Arc::clone(&repository);
                let txn = txn.clone();
                async move {
                    repository
                        .add_transaction(&txn)
                        .await
                        .map_err(OperationError::from)
                }
            }
        };

        let status = self
            .coordinator
            .execute(name, run, None, ExecuteOptions::optimistic(update, rollback))
            .await
            .map_err(into_client_error)
            .map(status_from)?;

        debug!(operation = name, id = %txn.id, pending = status.is_pending(), "recorded");
        Ok(Recorded {
            transaction: txn,
            status,
        })
    }

    /// Deletes a record.
    ///
    /// The record disappears from the cache at once and comes back if the
    /// store refuses the delete.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] if the store rejects the delete,
    /// e.g. because the record is a sale that still has payments.
    pub async fn delete_transaction(
        &self,
        customer: &CustomerId,
        id: &TransactionId,
    ) -> ClientResult<SyncStatus> {
        let removed = self
            .cache
            .read()
            .get(customer)
            .and_then(|records| records.iter().find(|t| &t.id == id).cloned());

        let update = {
            let cache = Arc::clone(&self.cache);
            let (customer, id) = (customer.clone(), id.clone());
            Hook::infallible(move || remove(&cache, &customer, &id))
        };
        let rollback = {
            let cache = Arc::clone(&self.cache);
            Hook::infallible(move || {
                if let Some(txn) = &removed {
                    upsert(&cache, txn);
                }
            })
        };
        let run = {
            let repository = Arc::clone(&self.repository);
            let (customer, id) = (customer.clone(), id.clone());
            move || {
                let repository = Arc::clone(&repository);
                let (customer, id) = (customer.clone(), id.clone());
                async move {
                    repository
                        .delete_transaction(&customer, &id)
                        .await
                        .map_err(OperationError::from)
                }
            }
        };

        self.coordinator
            .execute(
                "deleteTransaction",
                run,
                None,
                ExecuteOptions::optimistic(update, rollback),
            )
            .await
            .map_err(into_client_error)
            .map(status_from)
    }

    /// Replaces the cached records of `customer` with the store's.
    ///
    /// While the offline queue holds writes, cached records the store has not
    /// seen yet are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn refresh(&self, customer: &CustomerId) -> ClientResult<usize> {
        let mut records = self.repository.load_transactions(customer).await?;

        let mut cache = self.cache.write();
        if !self.coordinator.offline_queue().is_empty() {
            if let Some(cached) = cache.get(customer) {
                let local_only: Vec<Transaction> = cached
                    .iter()
                    .filter(|t| !records.iter().any(|r| r.id == t.id))
                    .cloned()
                    .collect();
                records.extend(local_only);
            }
        }

        let count = records.len();
        cache.insert(customer.clone(), records);
        debug!(customer = %customer, count, "cache refreshed");
        Ok(count)
    }

    /// Returns the cached records of `customer`.
    pub fn transactions(&self, customer: &CustomerId) -> Vec<Transaction> {
        self.cache.read().get(customer).cloned().unwrap_or_default()
    }

    /// Returns every memo group of `customer`, incomplete ones last.
    pub fn memo_groups(&self, customer: &CustomerId) -> Vec<MemoGroup> {
        group_by_memo(&self.transactions(customer))
    }

    /// Returns the running-balance statement of `customer` within `range`.
    pub fn statement(&self, customer: &CustomerId, range: DateRange) -> Vec<StatementLine> {
        running_balance(&self.transactions(customer), |t| range.contains(t.date))
    }

    /// Returns the aggregate of `customer` computed from the cache.
    pub fn balance(&self, customer: &CustomerId) -> CustomerBalance {
        CustomerBalance::from_transactions(customer.clone(), &self.transactions(customer))
    }
}

impl<S: RemoteStore + 'static> std::fmt::Debug for LedgerClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("coordinator", &self.coordinator)
            .field("customers", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

fn upsert(cache: &Cache, txn: &Transaction) {
    let mut cache = cache.write();
    let records = cache.entry(txn.customer_id.clone()).or_default();
    records.retain(|t| t.id != txn.id);
    records.push(txn.clone());
}

fn remove(cache: &Cache, customer: &CustomerId, id: &TransactionId) {
    if let Some(records) = cache.write().get_mut(customer) {
        records.retain(|t| &t.id != id);
    }
}

fn status_from(committed: Option<CustomerBalance>) -> SyncStatus {
    match committed {
        Some(balance) => SyncStatus::Synced(balance),
        None => SyncStatus::Pending,
    }
}

fn into_client_error(err: CoordinatorError) -> ClientError {
    match err {
        CoordinatorError::QueuedForOfflineProcessing { id } => ClientError::Queued(id),
        CoordinatorError::Failed(e) => ClientError::Operation(e),
    }
}
