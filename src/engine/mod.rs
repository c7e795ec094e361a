mod amount;
mod clock;
mod ledger;
mod record;
mod transaction;

pub use amount::{Amount, AmountError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{Ledger, LedgerError, aggregate};
pub use record::{ExportRecord, write_csv};
pub use transaction::{Counterparty, Transaction, ValidationError};
