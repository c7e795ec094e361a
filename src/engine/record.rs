use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

use crate::engine::ledger::LedgerError;
use crate::engine::{Amount, Counterparty, Transaction};

/// Format stored in the `date` and `created_at` columns.
/// Fixed width, so text order in SQLite is chronological order.
pub fn to_column(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_column(id: i64, column: &str, value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| LedgerError::Corrupt {
            id,
            reason: format!("{column}={value:?}: {e}"),
        })
}

/// One row of the `transactions` table as SQLite hands it back.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: i64,
    pub phone_number: String,
    pub amount: String,
    pub details: Option<String>,
    pub date: String,
    pub created_at: String,
}

pub const SELECT_COLUMNS: &str = "id, phone_number, amount, details, date, created_at";

impl StoredRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            id: row.get(0)?,
            phone_number: row.get(1)?,
            amount: row.get(2)?,
            details: row.get(3)?,
            date: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    pub fn to_transaction(&self) -> Result<Transaction, LedgerError> {
        let corrupt = |reason: String| LedgerError::Corrupt {
            id: self.id,
            reason,
        };

        let counterparty =
            Counterparty::parse(&self.phone_number).map_err(|e| corrupt(e.to_string()))?;
        let amount = Amount::from_str(&self.amount).map_err(|e| corrupt(e.to_string()))?;
        if !amount.is_positive() {
            Err(corrupt(format!("non-positive amount {amount}")))?
        }

        Ok(Transaction {
            id: self.id,
            counterparty,
            amount,
            details: self.details.clone(),
            occurred_at: from_column(self.id, "date", &self.date)?,
            recorded_at: from_column(self.id, "created_at", &self.created_at)?,
        })
    }
}

/// CSV shape of an exported transaction, same columns as the table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExportRecord {
    pub id: i64,
    pub phone_number: String,
    pub amount: String,
    pub details: Option<String>,
    pub date: String,
    pub created_at: String,
}

impl From<&Transaction> for ExportRecord {
    fn from(tx: &Transaction) -> Self {
        ExportRecord {
            id: tx.id,
            phone_number: tx.counterparty.to_string(),
            amount: tx.amount.to_string(),
            details: tx.details.clone(),
            date: to_column(&tx.occurred_at),
            created_at: to_column(&tx.recorded_at),
        }
    }
}

pub fn write_csv<W: Write>(writer: W, transactions: &[Transaction]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    log::debug!("Starting export of {} transactions", transactions.len());
    for tx in transactions {
        wtr.serialize(ExportRecord::from(tx))?;
    }

    log::debug!("Export done -> Flushing");
    wtr.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{StoredRow, to_column};
    use crate::engine::ledger::LedgerError;
    use chrono::{TimeZone, Utc};

    fn row() -> StoredRow {
        StoredRow {
            id: 7,
            phone_number: "9876543210".into(),
            amount: "500".into(),
            details: Some("grocery".into()),
            date: "2025-02-01T00:00:00.000Z".into(),
            created_at: "2025-02-01T00:00:00.001Z".into(),
        }
    }

    #[test]
    fn test_that_column_format_is_fixed_width_millis() {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(to_column(&at), "2025-02-01T00:00:00.000Z");
    }

    #[test]
    fn test_that_valid_row_decodes() {
        let tx = row().to_transaction().unwrap();
        assert_eq!(tx.id, 7);
        assert_eq!(tx.amount.to_string(), "500");
        assert_eq!(tx.details.as_deref(), Some("grocery"));
        assert_eq!(to_column(&tx.recorded_at), "2025-02-01T00:00:00.001Z");
    }

    #[test]
    fn test_that_bad_rows_are_reported_as_corrupt() {
        let mut bad_date = row();
        bad_date.date = "yesterday".into();
        assert!(matches!(
            bad_date.to_transaction(),
            Err(LedgerError::Corrupt { id: 7, .. })
        ));

        let mut bad_amount = row();
        bad_amount.amount = "-5".into();
        assert!(matches!(
            bad_amount.to_transaction(),
            Err(LedgerError::Corrupt { id: 7, .. })
        ));

        let mut bad_phone = row();
        bad_phone.phone_number = "abc".into();
        assert!(matches!(
            bad_phone.to_transaction(),
            Err(LedgerError::Corrupt { id: 7, .. })
        ));
    }
}
