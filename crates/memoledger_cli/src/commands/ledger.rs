//! Ledger command implementation.

use super::{load_export, money};
use memoledger_ledger::{
    complete_groups, group_by_memo, CustomerId, LedgerSummary, MemoGroup, MemoStatus, Transaction,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Memo groups of one customer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerLedger {
    /// Customer.
    pub customer_id: CustomerId,
    /// Totals over the groups.
    pub summary: LedgerSummary,
    /// Groups, incomplete ones last.
    pub groups: Vec<MemoGroup>,
}

/// Runs the ledger command.
pub fn run(
    path: &Path,
    customer: Option<&str>,
    format: &str,
    include_incomplete: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_export(path)?;
    let ledgers = build(&records, customer, include_incomplete);

    if let Some(customer) = customer {
        if ledgers.is_empty() {
            return Err(format!("No records for customer {customer}").into());
        }
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&ledgers)?);
        }
        _ => {
            print_text_output(&ledgers);
        }
    }

    Ok(())
}

/// Groups `records` per customer, optionally restricted to one customer.
pub fn build(
    records: &[Transaction],
    customer: Option<&str>,
    include_incomplete: bool,
) -> Vec<CustomerLedger> {
    let mut by_customer: BTreeMap<CustomerId, Vec<Transaction>> = BTreeMap::new();
    for txn in records {
        if customer.is_some_and(|c| c != txn.customer_id.as_str()) {
            continue;
        }
        by_customer
            .entry(txn.customer_id.clone())
            .or_default()
            .push(txn.clone());
    }

    by_customer
        .into_iter()
        .map(|(customer_id, records)| {
            let groups = group_by_memo(&records);
            let summary = LedgerSummary::from_groups(&groups);
            let groups = if include_incomplete {
                groups
            } else {
                complete_groups(groups)
            };
            CustomerLedger {
                customer_id,
                summary,
                groups,
            }
        })
        .collect()
}

fn status_label(status: MemoStatus) -> &'static str {
    match status {
        MemoStatus::Unpaid => "unpaid",
        MemoStatus::Partial => "partial",
        MemoStatus::Paid => "paid",
    }
}

fn print_text_output(ledgers: &[CustomerLedger]) {
    for ledger in ledgers {
        println!("Customer {}", ledger.customer_id);
        println!(
            "  {:<10} {:<10} {:>12} {:>12} {:>12}  {}",
            "Memo", "Date", "Total", "Paid", "Due", "Status"
        );
        for group in &ledger.groups {
            let date = group
                .sale_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let status = if group.is_complete() {
                status_label(group.status)
            } else {
                "no sale"
            };
            println!(
                "  {:<10} {:<10} {:>12} {:>12} {:>12}  {}",
                group.memo_number,
                date,
                money(group.total_amount),
                money(group.paid_amount),
                money(group.due_amount),
                status
            );
        }

        let summary = &ledger.summary;
        println!(
            "  {} memos ({} unpaid, {} partial, {} paid), {} due",
            summary.memo_count,
            summary.unpaid,
            summary.partial,
            summary.paid,
            money(summary.due_amount)
        );
        if summary.incomplete > 0 {
            println!(
                "  {} payment group(s) without a sale (use --all to show)",
                summary.incomplete
            );
        }
        println!();
    }
}
