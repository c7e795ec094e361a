//! Turns user-entered period tokens (`12/08/25`, `date=1-2-2025`, `month=9 year=25`, `10d`)
//! into concrete time windows.
//!
//! Pure: no I/O, and "now" is always passed in by the caller.

mod query;
mod window;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use thiserror::Error;

pub use query::{PeriodUnit, Query, parse};
pub use window::Window;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid date: {0:?}")]
    BadDate(String),

    #[error("Invalid month: {0:?}")]
    BadMonth(String),

    #[error("Invalid year: {0:?}")]
    BadYear(String),

    #[error("Invalid period: {0:?}")]
    BadPeriod(String),

    #[error("Unrecognized period: {0:?}")]
    Unrecognized(String),

    #[error("Local time {0} does not exist in this time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

/// Parses `token` (and an optional `year=` token) and resolves it against `now`.
pub fn resolve<Tz: TimeZone>(
    token: &str,
    year_token: Option<&str>,
    now: &DateTime<Tz>,
) -> Result<Window, ResolveError> {
    parse(token, year_token)?.window(now)
}

#[cfg(test)]
mod tests {
    use super::{ResolveError, Window, resolve};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_that_resolve_chains_parse_and_window() {
        let now = Utc.with_ymd_and_hms(2025, 8, 12, 15, 0, 0).unwrap();

        let window = resolve("12/08/25", None, &now).unwrap();
        assert!(matches!(window, Window::ExactDay { .. }));
        assert!(window.contains(&Utc.with_ymd_and_hms(2025, 8, 12, 23, 59, 59).unwrap()));

        assert_eq!(
            resolve("month=13", None, &now),
            Err(ResolveError::BadMonth("13".into()))
        );
        assert_eq!(
            resolve("soon", None, &now),
            Err(ResolveError::Unrecognized("soon".into()))
        );
    }
}
