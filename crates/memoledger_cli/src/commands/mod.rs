//! CLI command implementations.

pub mod dues;
pub mod ledger;
pub mod statement;

use memoledger_ledger::{LedgerError, Transaction};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The file could not be read.
    #[error("cannot read {path:?}: {source}")]
    Io {
        /// Export path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a JSON array of transactions.
    #[error("cannot decode {path:?}: {source}")]
    Decode {
        /// Export path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A record is malformed.
    #[error("record {index} is invalid: {source}")]
    Invalid {
        /// Zero-based position in the export.
        index: usize,
        /// Validation failure.
        source: LedgerError,
    },
}

/// Reads and validates an export.
pub fn load_export(path: &Path) -> Result<Vec<Transaction>, ExportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<Transaction> =
        serde_json::from_str(&raw).map_err(|source| ExportError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    for (index, txn) in records.iter().enumerate() {
        txn.validate()
            .map_err(|source| ExportError::Invalid { index, source })?;
    }

    debug!(path = %path.display(), records = records.len(), "export loaded");
    Ok(records)
}

/// Formats minor units as a decimal amount.
pub fn money(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoledger_testkit::{export_file, sample_ledger};
    use std::io::Write;

    #[test]
    fn load_export_reads_records() {
        let ledger = sample_ledger();
        let file = export_file(&ledger);
        let records = load_export(file.path()).unwrap();
        assert_eq!(records, ledger);
    }

    #[test]
    fn load_export_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let err = load_export(file.path()).unwrap_err();
        assert!(matches!(err, ExportError::Decode { .. }));
    }

    #[test]
    fn load_export_rejects_invalid_records() {
        let mut records = sample_ledger();
        records.push(memoledger_testkit::payment(
            "c1",
            "M1",
            -5,
            memoledger_testkit::date(2024, 3, 1),
        ));
        let file = export_file(&records);

        let err = load_export(file.path()).unwrap_err();
        assert!(matches!(err, ExportError::Invalid { index: 5, .. }));
    }

    #[test]
    fn load_export_missing_file() {
        let err = load_export(Path::new("/nonexistent/export.json")).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn money_formatting() {
        assert_eq!(money(0), "0.00");
        assert_eq!(money(50000), "500.00");
        assert_eq!(money(1205), "12.05");
        assert_eq!(money(-300), "-3.00");
    }
}
