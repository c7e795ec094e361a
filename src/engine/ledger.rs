use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::engine::amount::AmountError;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::record::{SELECT_COLUMNS, StoredRow, from_column, to_column};
use crate::engine::transaction::ValidationError;
use crate::engine::{Amount, Counterparty, Transaction};
use crate::period::Window;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Corrupt transaction id={id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Amount operation failed: {0}")]
    Amount(#[from] AmountError),

    #[error("Ledger connection lock poisoned")]
    Poisoned,
}

/// Append-only transaction store backed by a single SQLite file.
///
/// Every call goes to the database; nothing is cached. Writes are serialised
/// through the connection lock and an `IMMEDIATE` SQLite transaction, and are
/// committed before `append` returns.
pub struct Ledger<C: Clock = SystemClock> {
    conn: Mutex<Connection>,
    clock: C,
    path: Option<PathBuf>,
}

impl Ledger<SystemClock> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_clock(path, SystemClock)
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        Self::in_memory_with_clock(SystemClock)
    }
}

impl<C: Clock> Ledger<C> {
    pub fn open_with_clock(path: impl AsRef<Path>, clock: C) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        log::debug!("Opening ledger at {path:?}");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        Self::initialize(conn, clock, Some(path.to_path_buf()))
    }

    pub fn in_memory_with_clock(clock: C) -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, clock, None)
    }

    fn initialize(conn: Connection, clock: C, path: Option<PathBuf>) -> Result<Self, LedgerError> {
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Ledger {
            conn: Mutex::new(conn),
            clock,
            path,
        })
    }

    /// Releases the database. Dropping the ledger does the same, minus the error report.
    pub fn close(self) -> Result<(), LedgerError> {
        let conn = self.conn.into_inner().map_err(|_| LedgerError::Poisoned)?;
        conn.close().map_err(|(_, e)| e)?;
        log::debug!("Ledger closed: {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Records a transaction stamped with the current time.
    ///
    /// An empty `details` string is stored as no details.
    pub fn append(
        &self,
        counterparty: &Counterparty,
        amount: Amount,
        details: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        if !amount.is_positive() {
            log::warn!("Rejected append for {counterparty}: amount {amount}");
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }

        let details = details.filter(|d| !d.is_empty()).map(str::to_owned);
        let occurred_at = self.clock.now().trunc_subsecs(3);

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, created_at FROM transactions ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        // created_at must strictly increase even when the clock stalls or steps back
        let recorded_at = match previous {
            Some((id, created_at)) => {
                let previous = from_column(id, "created_at", &created_at)?;
                if previous >= occurred_at {
                    previous + TimeDelta::milliseconds(1)
                } else {
                    occurred_at
                }
            }
            None => occurred_at,
        };

        tx.execute(
            "INSERT INTO transactions (phone_number, amount, details, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                counterparty.as_str(),
                amount.to_string(),
                details,
                to_column(&occurred_at),
                to_column(&recorded_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        log::info!("Recorded transaction id={id} counterparty={counterparty} amount={amount}");

        Ok(Transaction {
            id,
            counterparty: counterparty.clone(),
            amount,
            details,
            occurred_at,
            recorded_at,
        })
    }

    fn select<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE {filter}");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter().map(StoredRow::to_transaction).collect()
    }

    /// Sum of every amount recorded for `counterparty`; zero when there are none.
    pub fn total_for(&self, counterparty: &Counterparty) -> Result<Amount, LedgerError> {
        let transactions = self.select("phone_number = ?1", params![counterparty.as_str()])?;
        Ok(aggregate(&transactions)?)
    }

    /// Most recently recorded transaction for `counterparty`.
    pub fn last_for(&self, counterparty: &Counterparty) -> Result<Option<Transaction>, LedgerError> {
        let mut transactions = self.select(
            "phone_number = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![counterparty.as_str()],
        )?;
        Ok(transactions.pop())
    }

    /// Transactions for `counterparty` that occurred inside `window`, most recent first.
    pub fn query_by_window(
        &self,
        counterparty: &Counterparty,
        window: &Window,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let start = to_column(&window.lower());
        log::debug!("Querying {counterparty} over {window:?}");

        match window.upper() {
            Some(end) => self.select(
                "phone_number = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY created_at DESC, id DESC",
                params![counterparty.as_str(), start, to_column(&end)],
            ),
            None => self.select(
                "phone_number = ?1 AND date >= ?2 ORDER BY created_at DESC, id DESC",
                params![counterparty.as_str(), start],
            ),
        }
    }

    /// Full history for `counterparty`, most recent first.
    pub fn history(&self, counterparty: &Counterparty) -> Result<Vec<Transaction>, LedgerError> {
        self.query_by_window(counterparty, &Window::all_time())
    }
}

/// Sum of the amounts in a query result; zero for an empty result.
pub fn aggregate(transactions: &[Transaction]) -> Result<Amount, AmountError> {
    Amount::checked_sum(transactions.iter().map(|tx| &tx.amount))
}
