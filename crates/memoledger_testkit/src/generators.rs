//! Property-based test generators using proptest.
//!
//! Provides strategies for generating ledgers that satisfy the repository's
//! acceptance rules: one sale per memo, payments only against memos with a
//! sale, positive amounts.

use crate::fixtures::{date, payment, sale};
use chrono::{Duration, NaiveDate};
use memoledger_ledger::{Amount, Transaction};
use proptest::prelude::*;

/// Strategy for positive amounts in minor units.
pub fn amount_strategy() -> impl Strategy<Value = Amount> {
    1..=1_000_000i64
}

/// Strategy for business dates in 2024.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0..366i64).prop_map(|offset| date(2024, 1, 1) + Duration::days(offset))
}

/// Strategy for memo numbers drawn from a small pool, so collisions happen.
pub fn memo_strategy() -> impl Strategy<Value = String> {
    (1..=8u32).prop_map(|n| format!("M{n}"))
}

/// Strategy for a single memo: a sale plus up to four payments, all for
/// `customer`.
pub fn memo_records_strategy(
    customer: &'static str,
    memo: String,
) -> impl Strategy<Value = Vec<Transaction>> {
    (
        amount_strategy(),
        0..=100i64,
        date_strategy(),
        prop::collection::vec((1..=500_000i64, 0..60i64), 0..4),
    )
        .prop_map(move |(total, deposit_pct, day, payments)| {
            let deposit = total * deposit_pct / 100;
            let mut records = vec![sale(customer, &memo, total, deposit, day)];
            for (amount, offset) in payments {
                records.push(payment(customer, &memo, amount, day + Duration::days(offset)));
            }
            records
        })
}

/// Strategy for a well-formed ledger of one customer with distinct memos.
pub fn ledger_strategy(customer: &'static str) -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::btree_set(memo_strategy(), 0..6)
        .prop_flat_map(move |memos| {
            memos
                .into_iter()
                .map(|memo| memo_records_strategy(customer, memo))
                .collect::<Vec<_>>()
        })
        .prop_map(|memos| memos.into_iter().flatten().collect())
}

/// Strategy for arbitrary records of one customer, including payments whose
/// memo has no sale and memos with several sales.
pub fn loose_transactions_strategy(
    customer: &'static str,
) -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(
        (
            any::<bool>(),
            memo_strategy(),
            amount_strategy(),
            date_strategy(),
        )
            .prop_map(move |(is_sale, memo, amount, day)| {
                if is_sale {
                    sale(customer, &memo, amount, amount / 2, day)
                } else {
                    payment(customer, &memo, amount, day)
                }
            }),
        0..24,
    )
}
