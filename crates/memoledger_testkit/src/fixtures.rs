//! Test fixtures and ledger helpers.
//!
//! Provides ready-made records, a wired-up store/repository/coordinator
//! stack, and export files for CLI tests.

use chrono::{NaiveDate, TimeZone, Utc};
use memoledger_ledger::{Amount, LedgerRepository, Transaction};
use memoledger_store::MemoryStore;
use memoledger_sync::{AtomicOperationCoordinator, ConnectionState, CoordinatorConfig};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Repository type used by the fixtures.
pub type MemoryRepository = LedgerRepository<Arc<MemoryStore>>;

/// Shorthand for a calendar date.
///
/// # Panics
///
/// Panics if the date is invalid.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// A sale whose creation time is 09:00 on its business date.
pub fn sale(
    customer: &str,
    memo: &str,
    total: Amount,
    deposit: Amount,
    day: NaiveDate,
) -> Transaction {
    stamp(
        Transaction::sale(customer.into(), memo.into(), total, deposit, day),
        9,
    )
}

/// A payment whose creation time is 12:00 on its business date.
pub fn payment(customer: &str, memo: &str, amount: Amount, day: NaiveDate) -> Transaction {
    stamp(Transaction::payment(customer.into(), memo.into(), amount, day), 12)
}

fn stamp(mut txn: Transaction, hour: u32) -> Transaction {
    if let Some(at) = txn.date.and_hms_opt(hour, 0, 0) {
        txn.created_at = Utc.from_utc_datetime(&at);
    }
    txn
}

/// A small two-customer ledger.
///
/// Customer `c1`:
/// - memo `M1`: sale 1000 with deposit 200, payment 300 (partial, 500 due)
/// - memo `M2`: sale 400 with deposit 400 (paid)
///
/// Customer `c2`:
/// - memo `M7`: sale 250, no deposit (unpaid)
/// - memo `M9`: payment 50 with no sale (incomplete)
pub fn sample_ledger() -> Vec<Transaction> {
    vec![
        sale("c1", "M1", 1000, 200, date(2024, 1, 10)),
        payment("c1", "M1", 300, date(2024, 1, 20)),
        sale("c1", "M2", 400, 400, date(2024, 2, 1)),
        sale("c2", "M7", 250, 0, date(2024, 1, 5)),
        payment("c2", "M9", 50, date(2024, 1, 6)),
    ]
}

/// Writes `transactions` as a JSON export to a temporary file.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn export_file(transactions: &[Transaction]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let json = serde_json::to_vec_pretty(transactions).expect("Failed to encode export");
    file.write_all(&json).expect("Failed to write export");
    file.flush().expect("Failed to flush export");
    file
}

/// A memory store, a repository on it and a coordinator, wired together.
pub struct TestLedger {
    /// The backing store; use it to inject faults.
    pub store: Arc<MemoryStore>,
    /// Repository on `store`.
    pub repository: Arc<MemoryRepository>,
    /// Coordinator starting connected.
    pub coordinator: Arc<AtomicOperationCoordinator>,
}

impl TestLedger {
    /// Creates an empty ledger stack with default coordinator settings.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::new())
    }

    /// Creates an empty ledger stack.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            repository: Arc::new(LedgerRepository::new(Arc::clone(&store))),
            coordinator: Arc::new(AtomicOperationCoordinator::in_memory(config)),
            store,
        }
    }

    /// Makes the store unreachable and tells the coordinator.
    pub fn disconnect(&self) {
        self.store.set_available(false);
        self.coordinator
            .connection()
            .set_state(ConnectionState::Disconnected);
    }

    /// Makes the store reachable again and tells the coordinator.
    pub fn reconnect(&self) {
        self.store.set_available(true);
        self.coordinator
            .connection()
            .set_state(ConnectionState::Connected);
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoledger_ledger::{group_by_memo, MemoStatus};

    #[test]
    fn sample_ledger_shape() {
        let records = sample_ledger();
        let c1: Vec<_> = records
            .iter()
            .filter(|t| t.customer_id.as_str() == "c1")
            .cloned()
            .collect();
        let groups = group_by_memo(&c1);
        assert_eq!(groups.len(), 2);
        let m1 = groups.iter().find(|g| g.memo_number.as_str() == "M1").unwrap();
        assert_eq!(m1.due_amount, 500);
        assert_eq!(m1.status, MemoStatus::Partial);
    }

    #[test]
    fn fixture_timestamps_follow_dates() {
        let txn = payment("c1", "M1", 10, date(2024, 5, 6));
        assert_eq!(txn.created_at.date_naive(), date(2024, 5, 6));
    }

    #[test]
    fn export_file_holds_the_records() {
        let records = sample_ledger();
        let file = export_file(&records);
        let raw = std::fs::read_to_string(file.path()).unwrap();
        let decoded: Vec<Transaction> = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_ledger_disconnect_reconnect() {
        let ledger = TestLedger::new();
        ledger.disconnect();
        assert!(!ledger.store.is_available());
        assert!(!ledger.coordinator.connection().is_connected());

        ledger.reconnect();
        assert!(ledger.store.is_available());
        assert!(ledger.coordinator.connection().is_connected());
    }
}
