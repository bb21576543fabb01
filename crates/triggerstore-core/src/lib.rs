//! # triggerstore-core
//!
//! Distributed job store: persists jobs, triggers and calendars in a
//! shared key-value store and coordinates trigger dispatch across
//! scheduler instances.
//!
//! ## Features
//!
//! - Trigger state machine materialized as one ordered set per state
//! - Acquisition of due triggers with per-trigger leases
//! - Misfire detection and repair
//! - Lease-based recovery sweep for crashed instances
//! - Pause/resume of trigger groups and job groups
//! - Non-concurrent jobs blocking their sibling triggers

pub mod calendar;
pub mod codec;
pub mod config;
pub mod error;
pub mod fired;
pub mod job;
pub mod keys;
pub mod lease;
pub mod matcher;
pub mod schedule;
pub mod schema;
pub mod signaler;
pub mod state;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

pub use calendar::Calendar;
pub use config::{ConfigError, JobStoreConfig};
pub use error::{JobStoreError, Result};
pub use fired::{CompletedExecutionInstruction, TriggerFiredBundle};
pub use job::JobDetail;
pub use keys::{DEFAULT_GROUP, JobKey, TriggerKey};
pub use lease::LeaseManager;
pub use matcher::GroupMatcher;
pub use schedule::{CronSchedule, REPEAT_INDEFINITELY, ScheduleCapability, SimpleSchedule, TriggerSchedule};
pub use schema::KeySchema;
pub use signaler::{NoopSignaler, RecordingSignaler, SchedulerSignaler, Signal};
pub use state::{StateIndex, TriggerState, TriggerStatus};
pub use store::JobStore;
pub use trigger::{MisfireInstruction, Trigger};
