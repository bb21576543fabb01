//! Fire-time computation for the trigger variants.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{JobStoreError, Result};

/// Repeat count meaning "repeat forever".
pub const REPEAT_INDEFINITELY: i32 = -1;

/// How a variant reacts when a misfire asks it to "do the smart thing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartPolicy {
    /// Fire immediately.
    FireNow,
    /// Skip missed fire times and wait for the next scheduled one.
    NextScheduled,
}

/// Per-variant schedule behaviour shared by simple and cron triggers.
pub trait ScheduleCapability {
    /// Stored discriminator of the variant.
    fn type_name(&self) -> &'static str;

    /// Reject definitions that can never produce fire times.
    fn validate(&self) -> Result<()>;

    /// First scheduled instant strictly after `after`, never before `start`.
    /// Calendars and end times are applied by the trigger.
    fn fire_time_after(
        &self,
        start: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    fn smart_policy(&self) -> SmartPolicy;

    /// Bookkeeping when the trigger fires.
    fn on_triggered(&mut self) {}
}

/// Fixed-interval schedule: fires at `start + k * interval` for
/// `k = 0..=repeat_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleSchedule {
    pub repeat_count: i32,
    pub repeat_interval_ms: i64,
    pub times_triggered: i32,
}

impl SimpleSchedule {
    pub fn new(repeat_interval: Duration, repeat_count: i32) -> Self {
        Self {
            repeat_count,
            repeat_interval_ms: repeat_interval.num_milliseconds(),
            times_triggered: 0,
        }
    }
}

impl ScheduleCapability for SimpleSchedule {
    fn type_name(&self) -> &'static str {
        "SIMPLE"
    }

    fn validate(&self) -> Result<()> {
        if self.repeat_count < REPEAT_INDEFINITELY {
            return Err(JobStoreError::InvalidSchedule(format!(
                "repeat count {} is negative",
                self.repeat_count
            )));
        }
        if self.repeat_count != 0 && self.repeat_interval_ms <= 0 {
            return Err(JobStoreError::InvalidSchedule(
                "repeating schedule needs a positive interval".to_string(),
            ));
        }
        Ok(())
    }

    fn fire_time_after(
        &self,
        start: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        if after < start {
            return Ok(Some(start));
        }
        if self.repeat_count == 0 || self.repeat_interval_ms <= 0 {
            return Ok(None);
        }
        let elapsed = (after - start).num_milliseconds();
        let k = elapsed / self.repeat_interval_ms + 1;
        if self.repeat_count != REPEAT_INDEFINITELY && k > i64::from(self.repeat_count) {
            return Ok(None);
        }
        let offset = k
            .checked_mul(self.repeat_interval_ms)
            .map(Duration::milliseconds);
        Ok(offset.and_then(|offset| start.checked_add_signed(offset)))
    }

    fn smart_policy(&self) -> SmartPolicy {
        if self.repeat_count == 0 {
            SmartPolicy::FireNow
        } else {
            SmartPolicy::NextScheduled
        }
    }

    fn on_triggered(&mut self) {
        self.times_triggered = self.times_triggered.saturating_add(1);
    }
}

/// Cron schedule evaluated in an IANA time zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub expression: String,
    pub time_zone: String,
}

impl CronSchedule {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            time_zone: "UTC".to_string(),
        }
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    fn parse(&self) -> Result<(cron::Schedule, Tz)> {
        let schedule: cron::Schedule = self.expression.parse().map_err(|e| {
            JobStoreError::InvalidSchedule(format!("cron '{}': {}", self.expression, e))
        })?;
        let tz = Tz::from_str(&self.time_zone).map_err(|e| {
            JobStoreError::InvalidSchedule(format!("time zone '{}': {}", self.time_zone, e))
        })?;
        Ok((schedule, tz))
    }
}

impl ScheduleCapability for CronSchedule {
    fn type_name(&self) -> &'static str {
        "CRON"
    }

    fn validate(&self) -> Result<()> {
        self.parse().map(|_| ())
    }

    fn fire_time_after(
        &self,
        start: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let (schedule, tz) = self.parse()?;
        let from = if after < start {
            start - Duration::milliseconds(1)
        } else {
            after
        };
        Ok(schedule
            .after(&from.with_timezone(&tz))
            .next()
            .map(|t| t.with_timezone(&Utc)))
    }

    fn smart_policy(&self) -> SmartPolicy {
        SmartPolicy::FireNow
    }
}

/// Closed set of schedule variants the store can persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSchedule {
    Simple(SimpleSchedule),
    Cron(CronSchedule),
}

impl TriggerSchedule {
    fn inner(&self) -> &dyn ScheduleCapability {
        match self {
            Self::Simple(s) => s,
            Self::Cron(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ScheduleCapability {
        match self {
            Self::Simple(s) => s,
            Self::Cron(c) => c,
        }
    }
}

impl ScheduleCapability for TriggerSchedule {
    fn type_name(&self) -> &'static str {
        self.inner().type_name()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }

    fn fire_time_after(
        &self,
        start: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.inner().fire_time_after(start, after)
    }

    fn smart_policy(&self) -> SmartPolicy {
        self.inner().smart_policy()
    }

    fn on_triggered(&mut self) {
        self.inner_mut().on_triggered()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
