//! Ledger record types.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A money amount in minor currency units.
pub type Amount = i64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }
    };
}

string_id!(
    /// Identifies a customer.
    CustomerId
);

string_id!(
    /// A merchant-issued memo number tying one sale to the payments against it.
    MemoNumber
);

string_id!(
    /// Identifies a single transaction record.
    ///
    /// Ids are generated before a write is submitted, so retries and offline
    /// replays of the same write always target the same document.
    TransactionId
);

impl TransactionId {
    /// Creates a new random transaction id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// What a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// A sale billed under a memo, with the deposit taken at the counter.
    Sale {
        /// Billed total.
        total: Amount,
        /// Amount paid at the time of sale.
        deposit: Amount,
    },
    /// A later payment against a memo.
    Payment {
        /// Amount paid.
        amount: Amount,
    },
}

impl TransactionKind {
    /// Returns true for sales.
    pub fn is_sale(&self) -> bool {
        matches!(self, TransactionKind::Sale { .. })
    }

    /// Returns how much was paid by this record.
    pub fn paid(&self) -> Amount {
        match *self {
            TransactionKind::Sale { deposit, .. } => deposit,
            TransactionKind::Payment { amount } => amount,
        }
    }

    /// Returns how this record moves the customer's outstanding balance.
    ///
    /// A sale adds what was left unpaid; a payment reduces the balance.
    pub fn balance_delta(&self) -> Amount {
        match *self {
            TransactionKind::Sale { total, deposit } => total - deposit,
            TransactionKind::Payment { amount } => -amount,
        }
    }
}

/// A single sale or payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Record id.
    pub id: TransactionId,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Memo this record belongs to.
    pub memo_number: MemoNumber,
    /// Sale or payment details.
    #[serde(flatten)]
    pub kind: TransactionKind,
    /// Business date of the record.
    pub date: NaiveDate,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Transaction {
    /// Creates a sale record with a fresh id.
    pub fn sale(
        customer_id: CustomerId,
        memo_number: MemoNumber,
        total: Amount,
        deposit: Amount,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            customer_id,
            memo_number,
            kind: TransactionKind::Sale { total, deposit },
            date,
            created_at: Utc::now(),
            note: None,
        }
    }

    /// Creates a payment record with a fresh id.
    pub fn payment(
        customer_id: CustomerId,
        memo_number: MemoNumber,
        amount: Amount,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            customer_id,
            memo_number,
            kind: TransactionKind::Payment { amount },
            date,
            created_at: Utc::now(),
            note: None,
        }
    }

    /// Attaches a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Checks the record for malformed fields.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if the customer or memo is blank,
    /// a sale total is not positive, a deposit falls outside `0..=total`, or a
    /// payment amount is not positive.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.customer_id.as_str().trim().is_empty() {
            return Err(LedgerError::validation("customer id is empty"));
        }
        if self.memo_number.as_str().trim().is_empty() {
            return Err(LedgerError::validation("memo number is empty"));
        }

        match self.kind {
            TransactionKind::Sale { total, deposit } => {
                if total <= 0 {
                    return Err(LedgerError::validation(format!(
                        "sale total must be positive, got {total}"
                    )));
                }
                if deposit < 0 || deposit > total {
                    return Err(LedgerError::validation(format!(
                        "deposit {deposit} must be between 0 and the total {total}"
                    )));
                }
            }
            TransactionKind::Payment { amount } => {
                if amount <= 0 {
                    return Err(LedgerError::validation(format!(
                        "payment amount must be positive, got {amount}"
                    )));
                }
            }
        }

        Ok(())
    }
}
