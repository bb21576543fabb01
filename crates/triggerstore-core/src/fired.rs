//! Firing and completion records exchanged with the scheduler loop.

use chrono::{DateTime, Utc};

use crate::calendar::Calendar;
use crate::job::JobDetail;
use crate::trigger::Trigger;

/// What to do with a trigger once its job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedExecutionInstruction {
    /// Leave the trigger's state alone.
    NoInstruction,
    DeleteTrigger,
    SetTriggerComplete,
    SetTriggerError,
    SetAllJobTriggersError,
    SetAllJobTriggersComplete,
}

/// Everything the executor needs to run one fired trigger.
#[derive(Debug, Clone)]
pub struct TriggerFiredBundle {
    pub job: JobDetail,
    /// The trigger after its fire transition.
    pub trigger: Trigger,
    pub calendar: Option<Calendar>,
    pub recovering: bool,
    pub fire_time: DateTime<Utc>,
    pub scheduled_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}
