//! Exclusion calendars.
//!
//! Calendars are stored as opaque JSON payloads; triggers consult them to
//! skip excluded fire times. All evaluation happens in UTC.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A named rule that excludes instants from firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calendar {
    /// Excludes whole days.
    Holiday {
        #[serde(default)]
        description: Option<String>,
        excluded_dates: BTreeSet<NaiveDate>,
    },
    /// Excludes days of the week, numbered from Monday = 1 to Sunday = 7.
    Weekly {
        #[serde(default)]
        description: Option<String>,
        excluded_days: BTreeSet<u32>,
    },
    /// Excludes a time-of-day window `[range_start, range_end)`, or
    /// everything outside it when `invert` is set.
    Daily {
        #[serde(default)]
        description: Option<String>,
        range_start: NaiveTime,
        range_end: NaiveTime,
        #[serde(default)]
        invert: bool,
    },
}

impl Calendar {
    pub fn holidays(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self::Holiday {
            description: None,
            excluded_dates: dates.into_iter().collect(),
        }
    }

    pub fn weekly(days: impl IntoIterator<Item = chrono::Weekday>) -> Self {
        Self::Weekly {
            description: None,
            excluded_days: days.into_iter().map(|d| d.number_from_monday()).collect(),
        }
    }

    pub fn daily(range_start: NaiveTime, range_end: NaiveTime) -> Self {
        Self::Daily {
            description: None,
            range_start,
            range_end,
            invert: false,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Holiday { description, .. }
            | Self::Weekly { description, .. }
            | Self::Daily { description, .. } => description.as_deref(),
        }
    }

    /// Whether a trigger may fire at `at`.
    pub fn is_time_included(&self, at: DateTime<Utc>) -> bool {
        match self {
            Self::Holiday { excluded_dates, .. } => !excluded_dates.contains(&at.date_naive()),
            Self::Weekly { excluded_days, .. } => {
                !excluded_days.contains(&at.weekday().number_from_monday())
            }
            Self::Daily {
                range_start,
                range_end,
                invert,
                ..
            } => {
                let time = at.time();
                let in_range = if range_start <= range_end {
                    *range_start <= time && time < *range_end
                } else {
                    // window wraps past midnight
                    time >= *range_start || time < *range_end
                };
                if *invert { in_range } else { !in_range }
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
