use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Period a report covers, relative to a caller-supplied `now`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportWindow {
    /// The seven days ending at `now`.
    Week,
    /// The calendar month containing `now`.
    #[default]
    Month,
    /// The calendar year containing `now`.
    Year,
    All,
}

impl ReportWindow {
    /// Half-open `[start, end)` bounds; `None` means unbounded.
    pub fn bounds(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Self::Week => Some((now - Duration::days(7), now + Duration::nanoseconds(1))),
            Self::Month => {
                let start = month_start(now.year(), now.month())?;
                let end = if now.month() == 12 {
                    month_start(now.year() + 1, 1)?
                } else {
                    month_start(now.year(), now.month() + 1)?
                };
                Some((start, end))
            }
            Self::Year => Some((month_start(now.year(), 1)?, month_start(now.year() + 1, 1)?)),
            Self::All => None,
        }
    }

    pub fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.bounds(now) {
            Some((start, end)) => start <= at && at < end,
            None => true,
        }
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?.and_utc())
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        })
    }
}

impl FromStr for ReportWindow {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(DomainError::invalid_input(format!(
                "unknown report window `{other}` (expected week|month|year|all)"
            ))),
        }
    }
}
