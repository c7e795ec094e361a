use chrono::{DateTime, Utc};

/// A concrete time range or cutoff used to filter transactions.
///
/// Bounds are instants in UTC; they were computed from civil time in whatever
/// zone the resolver was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// One calendar day, `00:00:00.000 ..= 23:59:59.999`.
    ExactDay {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// One calendar month, first instant `..=` last millisecond.
    Month {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Everything at or after `cutoff`.
    Since { cutoff: DateTime<Utc> },
}

impl Window {
    pub fn since(cutoff: DateTime<Utc>) -> Self {
        Window::Since { cutoff }
    }

    /// Full history: `since(0)`.
    pub fn all_time() -> Self {
        Window::since(DateTime::UNIX_EPOCH)
    }

    pub fn lower(&self) -> DateTime<Utc> {
        match *self {
            Window::ExactDay { start, .. } | Window::Month { start, .. } => start,
            Window::Since { cutoff } => cutoff,
        }
    }

    /// Inclusive upper bound, `None` when unbounded.
    pub fn upper(&self) -> Option<DateTime<Utc>> {
        match *self {
            Window::ExactDay { end, .. } | Window::Month { end, .. } => Some(end),
            Window::Since { .. } => None,
        }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.lower() && self.upper().is_none_or(|end| *at <= end)
    }
}
