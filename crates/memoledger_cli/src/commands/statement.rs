//! Statement command implementation.

use super::{load_export, money};
use chrono::NaiveDate;
use memoledger_ledger::{running_balance, DateRange, StatementLine, Transaction, TransactionKind};
use serde::Serialize;
use std::path::Path;

/// A customer's running balance over a date window.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    /// Customer.
    pub customer_id: String,
    /// First day included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    /// Last day included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    /// Rows in date order.
    pub lines: Vec<StatementLine>,
    /// Balance after the last row.
    pub closing_balance: i64,
}

/// Runs the statement command.
pub fn run(
    path: &Path,
    customer: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(format!("--from {from} is after --to {to}").into());
        }
    }

    let records = load_export(path)?;
    let statement = build(&records, customer, DateRange::new(from, to));

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&statement)?);
        }
        _ => {
            print_text_output(&statement);
        }
    }

    Ok(())
}

/// Builds the statement of `customer` within `range`.
pub fn build(records: &[Transaction], customer: &str, range: DateRange) -> Statement {
    let lines = running_balance(records, |t| {
        t.customer_id.as_str() == customer && range.contains(t.date)
    });
    let closing_balance = lines.last().map_or(0, |line| line.balance);

    Statement {
        customer_id: customer.to_string(),
        from: range.from,
        to: range.to,
        lines,
        closing_balance,
    }
}

fn print_text_output(statement: &Statement) {
    println!("Statement for {}", statement.customer_id);
    match (statement.from, statement.to) {
        (None, None) => {}
        (from, to) => println!(
            "Period: {} to {}",
            from.map_or_else(|| "start".to_string(), |d| d.to_string()),
            to.map_or_else(|| "today".to_string(), |d| d.to_string())
        ),
    }
    println!();

    if statement.lines.is_empty() {
        println!("No records in this period");
        return;
    }

    println!(
        "{:<10} {:<10} {:<8} {:>12} {:>12}",
        "Date", "Memo", "Type", "Amount", "Balance"
    );
    for line in &statement.lines {
        let kind = match line.transaction.kind {
            TransactionKind::Sale { .. } => "sale",
            TransactionKind::Payment { .. } => "payment",
        };
        println!(
            "{:<10} {:<10} {:<8} {:>12} {:>12}",
            line.transaction.date,
            line.transaction.memo_number,
            kind,
            money(line.delta),
            money(line.balance)
        );
    }
    println!();
    println!("Closing balance: {}", money(statement.closing_balance));
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoledger_testkit::{date, export_file, sample_ledger};

    #[test]
    fn full_statement() {
        let statement = build(&sample_ledger(), "c1", DateRange::default());
        let balances: Vec<i64> = statement.lines.iter().map(|l| l.balance).collect();
        assert_eq!(balances, vec![800, 500, 500]);
        assert_eq!(statement.closing_balance, 500);
    }

    #[test]
    fn windowed_statement_starts_from_zero() {
        let range = DateRange::new(Some(date(2024, 1, 15)), Some(date(2024, 1, 31)));
        let statement = build(&sample_ledger(), "c1", range);
        assert_eq!(statement.lines.len(), 1);
        assert_eq!(statement.closing_balance, -300);
    }

    #[test]
    fn unknown_customer_is_empty() {
        let statement = build(&sample_ledger(), "nobody", DateRange::default());
        assert!(statement.lines.is_empty());
        assert_eq!(statement.closing_balance, 0);
    }

    #[test]
    fn run_rejects_inverted_window() {
        let file = export_file(&sample_ledger());
        let err = run(
            file.path(),
            "c1",
            Some(date(2024, 2, 1)),
            Some(date(2024, 1, 1)),
            "text",
        );
        assert!(err.is_err());
        run(file.path(), "c1", None, None, "json").unwrap();
    }
}
