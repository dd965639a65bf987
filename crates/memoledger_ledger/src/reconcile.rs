//! Memo reconciliation and statement views.
//!
//! Everything here is a pure projection over a set of [`Transaction`]s. The
//! same input always produces the same output, regardless of whether the
//! records arrived from the remote store or from an offline replay.

use crate::types::{Amount, MemoNumber, Transaction, TransactionKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Payment status of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoStatus {
    /// Nothing has been paid.
    Unpaid,
    /// Something has been paid but an amount is still due.
    Partial,
    /// Nothing is due.
    Paid,
}

impl MemoStatus {
    /// Derives the status from the paid and due amounts.
    pub fn from_amounts(paid: Amount, due: Amount) -> Self {
        if due <= 0 {
            MemoStatus::Paid
        } else if paid > 0 {
            MemoStatus::Partial
        } else {
            MemoStatus::Unpaid
        }
    }
}

/// The reconciled view of one memo: its sale plus every payment against it.
///
/// # Invariants
///
/// - `due_amount == total_amount - paid_amount`
/// - `status == MemoStatus::from_amounts(paid_amount, due_amount)`
/// - Without a sale, all amounts are zero and the group is incomplete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoGroup {
    /// Memo number shared by every record in the group.
    pub memo_number: MemoNumber,
    /// The sale, if one has been observed.
    pub sale: Option<Transaction>,
    /// Payments in date order.
    pub payments: Vec<Transaction>,
    /// Billed total.
    pub total_amount: Amount,
    /// Deposit plus all payments.
    pub paid_amount: Amount,
    /// Outstanding amount.
    pub due_amount: Amount,
    /// Payment status.
    pub status: MemoStatus,
}

impl MemoGroup {
    /// Returns the sale date, if a sale has been observed.
    pub fn sale_date(&self) -> Option<NaiveDate> {
        self.sale.as_ref().map(|sale| sale.date)
    }

    /// Returns true if the group has a sale. Incomplete groups must not be
    /// shown in detail views.
    pub fn is_complete(&self) -> bool {
        self.sale.is_some()
    }
}

#[derive(Default)]
struct GroupBuilder {
    sale: Option<Transaction>,
    payments: Vec<Transaction>,
}

impl GroupBuilder {
    fn finish(mut self, memo_number: MemoNumber) -> MemoGroup {
        self.payments
            .sort_by(|a, b| (a.date, a.created_at, &a.id).cmp(&(b.date, b.created_at, &b.id)));

        let (total_amount, paid_amount) = match &self.sale {
            Some(sale) => {
                let total = match sale.kind {
                    TransactionKind::Sale { total, .. } => total,
                    TransactionKind::Payment { .. } => 0,
                };
                let paid = sale.kind.paid()
                    + self.payments.iter().map(|p| p.kind.paid()).sum::<Amount>();
                (total, paid)
            }
            // Payments with no sale yet stay out of the totals.
            None => (0, 0),
        };
        let due_amount = total_amount - paid_amount;

        MemoGroup {
            memo_number,
            sale: self.sale,
            payments: self.payments,
            total_amount,
            paid_amount,
            due_amount,
            status: MemoStatus::from_amounts(paid_amount, due_amount),
        }
    }
}

/// Groups a customer's transactions by memo number.
///
/// Runs in a single pass over the input. The result is sorted by sale date,
/// most recent first; groups without a sale sort last, and ties are broken by
/// memo number so the output is fully deterministic.
///
/// If a memo has more than one sale, the later one in input order wins.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use memoledger_ledger::{group_by_memo, MemoStatus, Transaction};
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
/// let records = vec![
///     Transaction::sale("c1".into(), "M1".into(), 1000, 200, day),
///     Transaction::payment("c1".into(), "M1".into(), 300, day),
/// ];
///
/// let groups = group_by_memo(&records);
/// assert_eq!(groups[0].paid_amount, 500);
/// assert_eq!(groups[0].due_amount, 500);
/// assert_eq!(groups[0].status, MemoStatus::Partial);
/// ```
pub fn group_by_memo(transactions: &[Transaction]) -> Vec<MemoGroup> {
    let mut builders: BTreeMap<MemoNumber, GroupBuilder> = BTreeMap::new();

    for txn in transactions {
        let builder = builders.entry(txn.memo_number.clone()).or_default();
        match txn.kind {
            TransactionKind::Sale { .. } => {
                if let Some(previous) = &builder.sale {
                    warn!(
                        memo = %txn.memo_number,
                        replaced = %previous.id,
                        by = %txn.id,
                        "memo has more than one sale"
                    );
                }
                builder.sale = Some(txn.clone());
            }
            TransactionKind::Payment { .. } => builder.payments.push(txn.clone()),
        }
    }

    let mut groups: Vec<MemoGroup> = builders
        .into_iter()
        .map(|(memo, builder)| builder.finish(memo))
        .collect();

    groups.sort_by(|a, b| {
        b.sale_date()
            .cmp(&a.sale_date())
            .then_with(|| a.memo_number.cmp(&b.memo_number))
    });
    groups
}

/// Keeps only groups that have a sale.
pub fn complete_groups(groups: Vec<MemoGroup>) -> Vec<MemoGroup> {
    groups.into_iter().filter(MemoGroup::is_complete).collect()
}

/// Counts and totals over a set of memo groups. Incomplete groups are
/// counted separately and excluded from the amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    /// Number of complete memos.
    pub memo_count: usize,
    /// Memos with nothing paid.
    pub unpaid: usize,
    /// Memos partly paid.
    pub partial: usize,
    /// Memos fully paid.
    pub paid: usize,
    /// Groups that have payments but no sale.
    pub incomplete: usize,
    /// Sum of billed totals.
    pub total_amount: Amount,
    /// Sum of paid amounts.
    pub paid_amount: Amount,
    /// Sum of due amounts.
    pub due_amount: Amount,
}

impl LedgerSummary {
    /// Summarises `groups`.
    pub fn from_groups(groups: &[MemoGroup]) -> Self {
        let mut summary = Self::default();
        for group in groups {
            if !group.is_complete() {
                summary.incomplete += 1;
                continue;
            }
            summary.memo_count += 1;
            match group.status {
                MemoStatus::Unpaid => summary.unpaid += 1,
                MemoStatus::Partial => summary.partial += 1,
                MemoStatus::Paid => summary.paid += 1,
            }
            summary.total_amount += group.total_amount;
            summary.paid_amount += group.paid_amount;
            summary.due_amount += group.due_amount;
        }
        summary
    }
}

/// An inclusive date window. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included.
    pub from: Option<NaiveDate>,
    /// Last day included.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a window between two optional bounds.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Returns true if `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// One row of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    /// The record.
    pub transaction: Transaction,
    /// How the record moved the balance.
    pub delta: Amount,
    /// Outstanding balance after this record.
    pub balance: Amount,
}

/// Builds a running-balance statement.
///
/// Records matching `filter` are ordered by date (then creation time) and
/// folded from a zero balance: a sale adds its unpaid remainder, a payment
/// subtracts its amount. The result is a derived view and is never persisted.
pub fn running_balance<F>(transactions: &[Transaction], filter: F) -> Vec<StatementLine>
where
    F: Fn(&Transaction) -> bool,
{
    let mut selected: Vec<&Transaction> = transactions.iter().filter(|t| filter(t)).collect();
    selected.sort_by(|a, b| (a.date, a.created_at, &a.id).cmp(&(b.date, b.created_at, &b.id)));

    let mut balance: Amount = 0;
    selected
        .into_iter()
        .map(|txn| {
            let delta = txn.kind.balance_delta();
            balance += delta;
            StatementLine {
                transaction: txn.clone(),
                delta,
                balance,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerId, TransactionId};
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(id: &str, memo: &str, kind: TransactionKind, date: NaiveDate) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            customer_id: CustomerId::new("c1"),
            memo_number: MemoNumber::new(memo),
            kind,
            date,
            created_at: Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap()),
            note: None,
        }
    }

    fn sale(id: &str, memo: &str, total: Amount, deposit: Amount, d: u32) -> Transaction {
        record(id, memo, TransactionKind::Sale { total, deposit }, day(d))
    }

    fn payment(id: &str, memo: &str, amount: Amount, d: u32) -> Transaction {
        record(id, memo, TransactionKind::Payment { amount }, day(d))
    }

    #[test]
    fn sale_with_deposit_and_payment_is_partial() {
        let groups = group_by_memo(&[sale("t1", "M1", 1000, 200, 1), payment("t2", "M1", 300, 2)]);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.total_amount, 1000);
        assert_eq!(group.paid_amount, 500);
        assert_eq!(group.due_amount, 500);
        assert_eq!(group.status, MemoStatus::Partial);
        assert_eq!(group.payments.len(), 1);
    }

    #[test]
    fn status_thresholds() {
        let groups = group_by_memo(&[
            sale("t1", "UNPAID", 500, 0, 1),
            sale("t2", "PAID", 500, 500, 2),
            sale("t3", "OVER", 500, 100, 3),
            payment("t4", "OVER", 600, 4),
        ]);
        let status: BTreeMap<_, _> = groups
            .iter()
            .map(|g| (g.memo_number.as_str().to_string(), (g.status, g.due_amount)))
            .collect();

        assert_eq!(status["UNPAID"], (MemoStatus::Unpaid, 500));
        assert_eq!(status["PAID"], (MemoStatus::Paid, 0));
        assert_eq!(status["OVER"], (MemoStatus::Paid, -200));
    }

    #[test]
    fn payment_before_sale_in_input_still_counts() {
        let groups = group_by_memo(&[payment("t2", "M1", 300, 2), sale("t1", "M1", 1000, 200, 1)]);
        assert_eq!(groups[0].paid_amount, 500);
    }

    #[test]
    fn orphan_payment_forms_incomplete_group() {
        let groups = group_by_memo(&[sale("t1", "M1", 1000, 0, 5), payment("t2", "M2", 300, 6)]);

        assert_eq!(groups.len(), 2);
        // Incomplete groups sort last.
        assert_eq!(groups[0].memo_number.as_str(), "M1");
        let orphan = &groups[1];
        assert!(!orphan.is_complete());
        assert_eq!(orphan.paid_amount, 0);
        assert_eq!(orphan.total_amount, 0);
        assert_eq!(orphan.payments.len(), 1);

        let complete = complete_groups(groups);
        assert_eq!(complete.len(), 1);
    }

    #[test]
    fn groups_sorted_most_recent_first() {
        let groups = group_by_memo(&[
            sale("t1", "OLD", 100, 0, 1),
            sale("t2", "NEW", 100, 0, 20),
            sale("t3", "MID", 100, 0, 10),
        ]);
        let order: Vec<&str> = groups.iter().map(|g| g.memo_number.as_str()).collect();
        assert_eq!(order, vec!["NEW", "MID", "OLD"]);
    }

    #[test]
    fn later_sale_replaces_earlier() {
        let groups = group_by_memo(&[sale("t1", "M1", 100, 0, 1), sale("t2", "M1", 250, 50, 2)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].total_amount, 250);
        assert_eq!(groups[0].paid_amount, 50);
    }

    #[test]
    fn summary_excludes_incomplete_groups() {
        let groups = group_by_memo(&[
            sale("t1", "M1", 1000, 200, 1),
            payment("t2", "M1", 300, 2),
            sale("t3", "M2", 400, 400, 3),
            payment("t4", "M3", 50, 4),
        ]);
        let summary = LedgerSummary::from_groups(&groups);
        assert_eq!(summary.memo_count, 2);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.paid, 1);
        assert_eq!(summary.incomplete, 1);
        assert_eq!(summary.total_amount, 1400);
        assert_eq!(summary.paid_amount, 900);
        assert_eq!(summary.due_amount, 500);
    }

    #[test]
    fn running_balance_folds_in_date_order() {
        let records = vec![
            payment("t3", "M1", 300, 3),
            sale("t1", "M1", 1000, 200, 1),
            sale("t2", "M2", 500, 0, 2),
        ];
        let lines = running_balance(&records, |_| true);

        let balances: Vec<Amount> = lines.iter().map(|l| l.balance).collect();
        assert_eq!(balances, vec![800, 1300, 1000]);
        assert_eq!(lines[2].delta, -300);
    }

    #[test]
    fn running_balance_applies_filter() {
        let records = vec![
            sale("t1", "M1", 1000, 200, 1),
            sale("t2", "M2", 500, 0, 2),
            payment("t3", "M1", 300, 3),
        ];
        let range = DateRange::new(Some(day(2)), None);
        let lines = running_balance(&records, |t| range.contains(t.date));
        let balances: Vec<Amount> = lines.iter().map(|l| l.balance).collect();
        assert_eq!(balances, vec![500, 200]);

        assert!(running_balance(&records, |_| false).is_empty());
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let range = DateRange::new(Some(day(2)), Some(day(4)));
        assert!(!range.contains(day(1)));
        assert!(range.contains(day(2)));
        assert!(range.contains(day(4)));
        assert!(!range.contains(day(5)));
        assert!(DateRange::default().contains(day(1)));
    }
}
