//! Triggers and their schedule transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::error::Result;
use crate::keys::{JobKey, TriggerKey};
use crate::schedule::{
    CronSchedule, ScheduleCapability, SimpleSchedule, SmartPolicy, TriggerSchedule,
};

/// Upper bound on consecutive calendar-excluded candidates skipped while
/// looking for the next fire time.
const MAX_CALENDAR_SKIPS: usize = 10_000;

/// Default trigger priority.
pub const DEFAULT_PRIORITY: i32 = 5;

/// What to do when a trigger missed its fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MisfireInstruction {
    /// Never treat the trigger as misfired.
    IgnoreMisfirePolicy,
    /// Let the schedule variant decide.
    #[default]
    Smart,
    /// Fire once immediately.
    FireNow,
    /// Skip to the next scheduled fire time.
    DoNothing,
}

impl MisfireInstruction {
    pub fn code(self) -> i32 {
        match self {
            Self::IgnoreMisfirePolicy => -1,
            Self::Smart => 0,
            Self::FireNow => 1,
            Self::DoNothing => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::IgnoreMisfirePolicy),
            0 => Some(Self::Smart),
            1 => Some(Self::FireNow),
            2 => Some(Self::DoNothing),
            _ => None,
        }
    }
}

/// A stored trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub key: TriggerKey,
    pub job_key: JobKey,
    pub description: Option<String>,
    pub schedule: TriggerSchedule,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub priority: i32,
    pub misfire_instruction: MisfireInstruction,
    pub calendar_name: Option<String>,
    pub fire_instance_id: Option<String>,
}

impl Trigger {
    pub fn new(
        key: TriggerKey,
        job_key: JobKey,
        schedule: TriggerSchedule,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            job_key,
            description: None,
            schedule,
            start_time,
            end_time: None,
            next_fire_time: None,
            previous_fire_time: None,
            priority: DEFAULT_PRIORITY,
            misfire_instruction: MisfireInstruction::Smart,
            calendar_name: None,
            fire_instance_id: None,
        }
    }

    /// Fixed-interval trigger whose first fire time is `start_time`.
    pub fn simple(
        key: TriggerKey,
        job_key: JobKey,
        start_time: DateTime<Utc>,
        repeat_interval: Duration,
        repeat_count: i32,
    ) -> Self {
        let schedule = TriggerSchedule::Simple(SimpleSchedule::new(repeat_interval, repeat_count));
        Self::new(key, job_key, schedule, start_time).with_next_fire_time(start_time)
    }

    /// Cron trigger in UTC. The next fire time is left for
    /// [`compute_first_fire_time`](Self::compute_first_fire_time).
    pub fn cron(
        key: TriggerKey,
        job_key: JobKey,
        expression: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        let schedule = TriggerSchedule::Cron(CronSchedule::new(expression));
        Self::new(key, job_key, schedule, start_time)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_next_fire_time(mut self, at: DateTime<Utc>) -> Self {
        self.next_fire_time = Some(at);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_misfire_instruction(mut self, instruction: MisfireInstruction) -> Self {
        self.misfire_instruction = instruction;
        self
    }

    pub fn with_calendar(mut self, calendar_name: impl Into<String>) -> Self {
        self.calendar_name = Some(calendar_name.into());
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        if let TriggerSchedule::Cron(cron) = &mut self.schedule {
            cron.time_zone = time_zone.into();
        }
        self
    }

    pub fn may_fire_again(&self) -> bool {
        self.next_fire_time.is_some()
    }

    /// Next instant strictly after `after` that respects the end time and
    /// is included by `calendar`.
    pub fn fire_time_after(
        &self,
        after: DateTime<Utc>,
        calendar: Option<&Calendar>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut candidate = self.schedule.fire_time_after(self.start_time, after)?;
        let mut skipped = 0;
        while let Some(at) = candidate {
            if self.end_time.is_some_and(|end| at > end) {
                return Ok(None);
            }
            if calendar.is_none_or(|c| c.is_time_included(at)) {
                return Ok(Some(at));
            }
            skipped += 1;
            if skipped >= MAX_CALENDAR_SKIPS {
                return Ok(None);
            }
            candidate = self.schedule.fire_time_after(self.start_time, at)?;
        }
        Ok(None)
    }

    /// Set and return the first fire time at or after the start time.
    pub fn compute_first_fire_time(
        &mut self,
        calendar: Option<&Calendar>,
    ) -> Result<Option<DateTime<Utc>>> {
        let before_start = self.start_time - Duration::milliseconds(1);
        self.next_fire_time = self.fire_time_after(before_start, calendar)?;
        Ok(self.next_fire_time)
    }

    /// Advance past the fire time that is being handed out.
    pub fn triggered(&mut self, calendar: Option<&Calendar>) -> Result<()> {
        self.schedule.on_triggered();
        self.previous_fire_time = self.next_fire_time;
        if let Some(fired) = self.next_fire_time {
            self.next_fire_time = self.fire_time_after(fired, calendar)?;
        }
        Ok(())
    }

    /// Whether the next fire time lies more than `threshold_ms` in the past.
    ///
    /// A threshold reaching past the representable time range never misfires.
    pub fn is_misfired(&self, now: DateTime<Utc>, threshold_ms: i64) -> bool {
        if self.misfire_instruction == MisfireInstruction::IgnoreMisfirePolicy {
            return false;
        }
        match misfire_cutoff(now, threshold_ms) {
            Some(cutoff) => self.next_fire_time.is_some_and(|next| next < cutoff),
            None => false,
        }
    }

    /// Recompute the next fire time after a misfire.
    pub fn update_after_misfire(
        &mut self,
        calendar: Option<&Calendar>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let fire_now = match self.misfire_instruction {
            MisfireInstruction::IgnoreMisfirePolicy => return Ok(()),
            MisfireInstruction::FireNow => true,
            MisfireInstruction::DoNothing => false,
            MisfireInstruction::Smart => self.schedule.smart_policy() == SmartPolicy::FireNow,
        };

        self.next_fire_time = if fire_now {
            if self.end_time.is_some_and(|end| now > end) {
                None
            } else if calendar.is_none_or(|c| c.is_time_included(now)) {
                Some(now)
            } else {
                self.fire_time_after(now, calendar)?
            }
        } else {
            self.fire_time_after(now, calendar)?
        };
        Ok(())
    }

    /// Recompute the next fire time against a changed calendar. Fire times
    /// that would already count as misfired are skipped.
    pub fn update_with_calendar(
        &mut self,
        calendar: Option<&Calendar>,
        now: DateTime<Utc>,
        misfire_threshold_ms: i64,
    ) -> Result<()> {
        let after = self
            .previous_fire_time
            .unwrap_or(self.start_time - Duration::milliseconds(1));
        let mut next = self.fire_time_after(after, calendar)?;
        let too_late = match misfire_cutoff(now, misfire_threshold_ms) {
            Some(cutoff) => next.is_some_and(|at| at < cutoff),
            None => false,
        };
        if too_late {
            next = self.fire_time_after(now, calendar)?;
        }
        self.next_fire_time = next;
        Ok(())
    }
}

/// `now - threshold_ms`, or `None` when that is out of range.
fn misfire_cutoff(now: DateTime<Utc>, threshold_ms: i64) -> Option<DateTime<Utc>> {
    Duration::try_milliseconds(threshold_ms)
        .and_then(|threshold| now.checked_sub_signed(threshold))
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
