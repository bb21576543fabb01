//! Notifications emitted to the surrounding scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::keys::JobKey;
use crate::trigger::Trigger;

/// Listener collaborator. Calls are fire-and-forget.
#[async_trait]
pub trait SchedulerSignaler: Send + Sync {
    async fn notify_trigger_listeners_misfired(&self, trigger: &Trigger);

    async fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger);

    async fn notify_scheduler_listeners_job_deleted(&self, job: &JobKey);

    /// New work may be available at `candidate_new_next_fire_time`.
    async fn signal_scheduling_change(&self, candidate_new_next_fire_time: Option<DateTime<Utc>>);
}

/// Signaler that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignaler;

#[async_trait]
impl SchedulerSignaler for NoopSignaler {
    async fn notify_trigger_listeners_misfired(&self, _trigger: &Trigger) {}

    async fn notify_scheduler_listeners_finalized(&self, _trigger: &Trigger) {}

    async fn notify_scheduler_listeners_job_deleted(&self, _job: &JobKey) {}

    async fn signal_scheduling_change(&self, _candidate: Option<DateTime<Utc>>) {}
}

/// A notification captured by [`RecordingSignaler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Misfired(String),
    Finalized(String),
    JobDeleted(String),
    SchedulingChange(Option<DateTime<Utc>>),
}

/// Signaler that records notifications for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSignaler {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingSignaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().clone()
    }

    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.signals.lock())
    }

    pub fn misfired(&self) -> Vec<String> {
        self.signals
            .lock()
            .iter()
            .filter_map(|s| match s {
                Signal::Misfired(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, signal: Signal) {
        self.signals.lock().push(signal);
    }
}

#[async_trait]
impl SchedulerSignaler for RecordingSignaler {
    async fn notify_trigger_listeners_misfired(&self, trigger: &Trigger) {
        self.push(Signal::Misfired(trigger.key.to_string()));
    }

    async fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger) {
        self.push(Signal::Finalized(trigger.key.to_string()));
    }

    async fn notify_scheduler_listeners_job_deleted(&self, job: &JobKey) {
        self.push(Signal::JobDeleted(job.to_string()));
    }

    async fn signal_scheduling_change(&self, candidate: Option<DateTime<Utc>>) {
        self.push(Signal::SchedulingChange(candidate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::TriggerKey;

    #[tokio::test]
    async fn test_recording_signaler() {
        let signaler = RecordingSignaler::new();
        let trigger = Trigger::simple(
            TriggerKey::new("t", "g"),
            JobKey::named("j"),
            Utc::now(),
            chrono::Duration::seconds(1),
            0,
        );

        signaler.notify_trigger_listeners_misfired(&trigger).await;
        signaler
            .notify_scheduler_listeners_job_deleted(&trigger.job_key)
            .await;
        signaler.signal_scheduling_change(None).await;

        assert_eq!(signaler.misfired(), vec!["g.t".to_string()]);
        assert_eq!(signaler.signals().len(), 3);
        assert_eq!(signaler.take().len(), 3);
        assert!(signaler.signals().is_empty());
    }
}
