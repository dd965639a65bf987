//! Customer aggregate balances.

use crate::reconcile::{group_by_memo, LedgerSummary};
use crate::types::{Amount, CustomerId, Transaction};
use serde::{Deserialize, Serialize};

/// The aggregate a customer's records contribute to.
///
/// Stored alongside the records and rewritten in the same atomic batch as
/// every change to them. Always derivable from the records alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBalance {
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Sum of billed totals over complete memos.
    pub total_sales: Amount,
    /// Deposits and payments over complete memos.
    pub total_paid: Amount,
    /// Outstanding amount over complete memos.
    pub total_due: Amount,
    /// Number of complete memos.
    pub memo_count: usize,
    /// Number of records, including payments not yet matched to a sale.
    pub transaction_count: usize,
}

impl CustomerBalance {
    /// Recomputes the aggregate from the full set of a customer's records.
    pub fn from_transactions(customer_id: CustomerId, transactions: &[Transaction]) -> Self {
        let summary = LedgerSummary::from_groups(&group_by_memo(transactions));
        Self {
            customer_id,
            total_sales: summary.total_amount,
            total_paid: summary.paid_amount,
            total_due: summary.due_amount,
            memo_count: summary.memo_count,
            transaction_count: transactions.len(),
        }
    }
}
