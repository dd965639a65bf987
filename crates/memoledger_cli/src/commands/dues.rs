//! Dues command implementation.

use super::{load_export, money};
use memoledger_ledger::{CustomerBalance, CustomerId, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Balances of every customer in an export.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuesReport {
    /// One entry per customer, by customer id.
    pub customers: Vec<CustomerBalance>,
    /// Sum of every customer's due amount.
    pub total_due: i64,
}

/// Runs the dues command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_export(path)?;
    let report = build(&records);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

/// Computes per-customer balances.
pub fn build(records: &[Transaction]) -> DuesReport {
    let mut by_customer: BTreeMap<CustomerId, Vec<Transaction>> = BTreeMap::new();
    for txn in records {
        by_customer
            .entry(txn.customer_id.clone())
            .or_default()
            .push(txn.clone());
    }

    let customers: Vec<CustomerBalance> = by_customer
        .into_iter()
        .map(|(customer, records)| CustomerBalance::from_transactions(customer, &records))
        .collect();
    let total_due = customers.iter().map(|c| c.total_due).sum();

    DuesReport {
        customers,
        total_due,
    }
}

fn print_text_output(report: &DuesReport) {
    println!(
        "{:<16} {:>6} {:>12} {:>12} {:>12}",
        "Customer", "Memos", "Sales", "Paid", "Due"
    );
    for balance in &report.customers {
        println!(
            "{:<16} {:>6} {:>12} {:>12} {:>12}",
            balance.customer_id,
            balance.memo_count,
            money(balance.total_sales),
            money(balance.total_paid),
            money(balance.total_due)
        );
    }
    println!();
    println!("Total due: {}", money(report.total_due));
}
