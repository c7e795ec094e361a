use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::period::{ResolveError, Window};

static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{2}|[0-9]{4})$").expect("Invalid date regex pattern")
});

static DASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})-([0-9]{1,2})-([0-9]{2}|[0-9]{4})$").expect("Invalid date regex pattern")
});

static ROLLING_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)([dDmMyY])$").expect("Invalid period regex pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Days,
    Months,
    Years,
}

impl PeriodUnit {
    pub fn symbol(&self) -> char {
        match self {
            PeriodUnit::Days => 'D',
            PeriodUnit::Months => 'M',
            PeriodUnit::Years => 'Y',
        }
    }
}

/// A recognised period expression, still in civil terms.
/// Turned into a [`Window`] once "now" and a time zone are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Day(NaiveDate),
    /// `year` is `None` when the current year should be used.
    Month { year: Option<i32>, month: u32 },
    Rolling { count: u32, unit: PeriodUnit },
}

enum Matched {
    Hit(Query),
    Miss,
    Fail(ResolveError),
}

type Matcher = fn(&str, Option<&str>) -> Matched;

/// Tried in order, the first `Hit` or `Fail` wins.
/// Explicit dates go first so `1-2-25` is never read as anything else.
const MATCHERS: [Matcher; 4] = [match_date, match_date_key, match_month_key, match_rolling];

/// Two-digit years 00-30 are 20xx, 31-99 are 19xx.
fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    match digits.len() {
        2 if value <= 30 => Some(2000 + value),
        2 => Some(1900 + value),
        4 => Some(value),
        _ => None,
    }
}

fn match_date(token: &str, _: Option<&str>) -> Matched {
    let Some(caps) = SLASH_DATE
        .captures(token)
        .or_else(|| DASH_DATE.captures(token))
    else {
        return Matched::Miss;
    };

    let day = caps[1].parse::<u32>().ok();
    let month = caps[2].parse::<u32>().ok();
    let year = expand_year(&caps[3]);

    // from_ymd_opt rejects days that do not exist instead of rolling over
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => match NaiveDate::from_ymd_opt(y, m, d) {
            Some(date) => Matched::Hit(Query::Day(date)),
            None => Matched::Fail(ResolveError::BadDate(token.to_owned())),
        },
        _ => Matched::Fail(ResolveError::BadDate(token.to_owned())),
    }
}

fn match_date_key(token: &str, _: Option<&str>) -> Matched {
    let Some(value) = token.strip_prefix("date=") else {
        return Matched::Miss;
    };

    match match_date(value, None) {
        Matched::Miss => Matched::Fail(ResolveError::BadDate(value.to_owned())),
        matched => matched,
    }
}

fn match_month_key(token: &str, year_token: Option<&str>) -> Matched {
    let Some(value) = token.strip_prefix("month=") else {
        return Matched::Miss;
    };

    let month = match value.parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) && value.bytes().all(|b| b.is_ascii_digit()) => m,
        _ => return Matched::Fail(ResolveError::BadMonth(value.to_owned())),
    };

    let year = match year_token.and_then(|t| t.strip_prefix("year=")) {
        None => None,
        Some(digits) if digits.bytes().all(|b| b.is_ascii_digit()) => match expand_year(digits) {
            Some(y) => Some(y),
            None => return Matched::Fail(ResolveError::BadYear(digits.to_owned())),
        },
        Some(other) => return Matched::Fail(ResolveError::BadYear(other.to_owned())),
    };

    Matched::Hit(Query::Month { year, month })
}

fn match_rolling(token: &str, _: Option<&str>) -> Matched {
    let Some(caps) = ROLLING_PERIOD.captures(token) else {
        return Matched::Miss;
    };

    let count = match caps[1].parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return Matched::Fail(ResolveError::BadPeriod(token.to_owned())),
    };
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "d" => PeriodUnit::Days,
        "m" => PeriodUnit::Months,
        _ => PeriodUnit::Years,
    };

    Matched::Hit(Query::Rolling { count, unit })
}

/// Recognises a period token, with an optional `year=` token for `month=`.
pub fn parse(token: &str, year_token: Option<&str>) -> Result<Query, ResolveError> {
    for matcher in MATCHERS {
        match matcher(token, year_token) {
            Matched::Hit(query) => return Ok(query),
            Matched::Fail(e) => return Err(e),
            Matched::Miss => continue,
        }
    }
    Err(ResolveError::Unrecognized(token.to_owned()))
}

fn start_of_day<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> Result<DateTime<Utc>, ResolveError> {
    let local = date.and_time(NaiveTime::MIN);
    zone.from_local_datetime(&local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(ResolveError::NonexistentLocalTime(local))
}

/// Steps `date` back by whole months. A day past the end of the target month
/// carries into the following month (`31/3 - 1m` is `3/3`, not `28/2`).
fn months_back(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) - i64::from(months);
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;

    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_days(Days::new(u64::from(date.day0())))
}

fn end_of_day<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> Result<DateTime<Utc>, ResolveError> {
    let local = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| ResolveError::BadDate(date.to_string()))?;
    zone.from_local_datetime(&local)
        .latest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(ResolveError::NonexistentLocalTime(local))
}

impl Query {
    /// Resolves against `now`, using the civil time of `now`'s zone for day
    /// boundaries.
    ///
    /// Rolling days include today (`10d` starts 9 days back); rolling months
    /// and years step back the full count, rolling into the next month when
    /// the target month is too short.
    pub fn window<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Window, ResolveError> {
        let zone = now.timezone();

        match *self {
            Query::Day(date) => Ok(Window::ExactDay {
                start: start_of_day(&zone, date)?,
                end: end_of_day(&zone, date)?,
            }),
            Query::Month { year, month } => {
                let year = year.unwrap_or_else(|| now.year());
                let first = NaiveDate::from_ymd_opt(year, month, 1)
                    .ok_or_else(|| ResolveError::BadMonth(format!("{month}/{year}")))?;
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(|| ResolveError::BadYear(year.to_string()))?;

                Ok(Window::Month {
                    start: start_of_day(&zone, first)?,
                    end: end_of_day(&zone, last)?,
                })
            }
            Query::Rolling { count, unit } => {
                let today = now.date_naive();
                let from = match unit {
                    PeriodUnit::Days => {
                        today.checked_sub_days(Days::new(u64::from(count.saturating_sub(1))))
                    }
                    PeriodUnit::Months => months_back(today, count),
                    PeriodUnit::Years => count
                        .checked_mul(12)
                        .and_then(|months| months_back(today, months)),
                }
                .ok_or_else(|| ResolveError::BadPeriod(format!("{count}{}", unit.symbol())))?;

                Ok(Window::since(start_of_day(&zone, from)?))
            }
        }
    }
}
