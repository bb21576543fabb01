//! Firing acquired triggers and reconciling after execution.

use tracing::{debug, info, warn};

use super::JobStore;
use crate::error::Result;
use crate::fired::{CompletedExecutionInstruction, TriggerFiredBundle};
use crate::job::JobDetail;
use crate::keys::{JobKey, TriggerKey};
use crate::state::TriggerState;
use crate::trigger::Trigger;

impl JobStore {
    /// Fire acquired triggers, returning one bundle per trigger that could
    /// be fired. Triggers that vanished, left the acquired state, were
    /// acquired again under a new fire instance id or lost their calendar
    /// are skipped.
    pub async fn triggers_fired(&self, triggers: &[Trigger]) -> Result<Vec<TriggerFiredBundle>> {
        self.leases.heartbeat().await?;
        let mut bundles = Vec::with_capacity(triggers.len());

        for candidate in triggers {
            let key = &candidate.key;
            let Some(mut trigger) = self.load_trigger(key).await? else {
                debug!("Fired trigger '{}' no longer exists", key);
                continue;
            };
            if !self.states.is_in(key, TriggerState::Acquired).await? {
                warn!("Trigger '{}' is no longer acquired; not firing", key);
                continue;
            }
            if candidate.fire_instance_id.is_some()
                && candidate.fire_instance_id != trigger.fire_instance_id
            {
                warn!("Trigger '{}' was re-acquired since this acquisition; not firing", key);
                continue;
            }

            let calendar = match &trigger.calendar_name {
                Some(name) => match self.load_calendar(name).await? {
                    Some(calendar) => Some(calendar),
                    None => {
                        warn!("Calendar '{}' of trigger '{}' was removed", name, key);
                        continue;
                    }
                },
                None => None,
            };

            let Some(job) = self.load_job(&trigger.job_key).await? else {
                warn!("Trigger '{}' fires missing job '{}'", key, trigger.job_key);
                self.set_state(&trigger, TriggerState::Error).await?;
                self.leases.release_trigger_lease(key).await?;
                continue;
            };

            if job.concurrent_execution_disallowed
                && self.leases.is_job_blocked_by_live_instance(&job.key).await?
            {
                debug!("Job '{}' is already running; blocking '{}'", job.key, key);
                self.set_state(&trigger, TriggerState::Blocked).await?;
                self.leases.release_trigger_lease(key).await?;
                continue;
            }

            let scheduled_fire_time = trigger.next_fire_time;
            let previous_fire_time = trigger.previous_fire_time;
            trigger.triggered(calendar.as_ref())?;
            self.persist_trigger(&trigger).await?;

            if job.concurrent_execution_disallowed {
                self.block_siblings(&job.key, key).await?;
                self.leases.block_job(&job.key).await?;
            }

            if trigger.may_fire_again() {
                self.set_state(&trigger, TriggerState::Waiting).await?;
            } else {
                self.states.clear_state(key).await?;
            }
            self.leases.release_trigger_lease(key).await?;

            bundles.push(TriggerFiredBundle {
                fire_time: self.now(),
                scheduled_fire_time,
                previous_fire_time,
                next_fire_time: trigger.next_fire_time,
                job,
                calendar,
                recovering: false,
                trigger,
            });
        }

        if !bundles.is_empty() {
            debug!("Fired {} trigger(s)", bundles.len());
        }
        Ok(bundles)
    }

    /// Move a running non-concurrent job's other triggers out of reach.
    async fn block_siblings(&self, job: &JobKey, fired: &TriggerKey) -> Result<()> {
        for sibling in self.job_trigger_keys(job).await? {
            if &sibling == fired {
                continue;
            }
            let (target, score) = match self.states.current_entry(&sibling).await? {
                Some((TriggerState::Waiting | TriggerState::Acquired, score)) => {
                    (TriggerState::Blocked, score)
                }
                Some((TriggerState::Paused, score)) => (TriggerState::PausedBlocked, score),
                _ => continue,
            };
            self.states.set_state(&sibling, target, score).await?;
        }
        Ok(())
    }

    /// Return a finished non-concurrent job's triggers to their unblocked
    /// states.
    async fn unblock_siblings(&self, job: &JobKey) -> Result<()> {
        for sibling in self.job_trigger_keys(job).await? {
            let (target, score) = match self.states.current_entry(&sibling).await? {
                Some((TriggerState::Blocked, score)) => (TriggerState::Waiting, score),
                Some((TriggerState::PausedBlocked, score)) => (TriggerState::Paused, score),
                _ => continue,
            };
            self.states.set_state(&sibling, target, score).await?;
        }
        Ok(())
    }

    /// Reconcile state after the job fired by `trigger` finished.
    pub async fn triggered_job_complete(
        &self,
        trigger: &Trigger,
        job: &JobDetail,
        instruction: CompletedExecutionInstruction,
    ) -> Result<()> {
        let job_exists = self.check_job_exists(&job.key).await?;
        if job.persist_job_data_after_execution && job_exists {
            self.write_job_data(job).await?;
        }

        if job.concurrent_execution_disallowed {
            self.leases.unblock_job(&job.key).await?;
            self.unblock_siblings(&job.key).await?;
            self.signaler.signal_scheduling_change(None).await;
        }

        match instruction {
            CompletedExecutionInstruction::NoInstruction => {}
            CompletedExecutionInstruction::DeleteTrigger => {
                if trigger.next_fire_time.is_some() {
                    if self.remove_trigger(&trigger.key, true).await? {
                        info!("Deleted trigger '{}' after execution", trigger.key);
                    }
                    self.signaler.signal_scheduling_change(None).await;
                } else if self.is_rescheduled(&trigger.key).await? {
                    debug!("Trigger '{}' was rescheduled during execution; keeping it", trigger.key);
                } else if self.remove_trigger(&trigger.key, true).await? {
                    info!("Deleted trigger '{}' after execution", trigger.key);
                }
            }
            CompletedExecutionInstruction::SetTriggerComplete => {
                self.set_stored_trigger_state(&trigger.key, TriggerState::Completed)
                    .await?;
                self.signaler.signal_scheduling_change(None).await;
            }
            CompletedExecutionInstruction::SetTriggerError => {
                warn!("Trigger '{}' set to error state", trigger.key);
                self.set_stored_trigger_state(&trigger.key, TriggerState::Error)
                    .await?;
                self.signaler.signal_scheduling_change(None).await;
            }
            CompletedExecutionInstruction::SetAllJobTriggersError => {
                warn!("All triggers of job '{}' set to error state", job.key);
                for key in self.job_trigger_keys(&job.key).await? {
                    self.set_stored_trigger_state(&key, TriggerState::Error)
                        .await?;
                }
                self.signaler.signal_scheduling_change(None).await;
            }
            CompletedExecutionInstruction::SetAllJobTriggersComplete => {
                for key in self.job_trigger_keys(&job.key).await? {
                    self.set_stored_trigger_state(&key, TriggerState::Completed)
                        .await?;
                }
                self.signaler.signal_scheduling_change(None).await;
            }
        }
        Ok(())
    }

    /// Whether the stored copy of a trigger has a fire time again.
    async fn is_rescheduled(&self, key: &TriggerKey) -> Result<bool> {
        Ok(self
            .load_trigger(key)
            .await?
            .is_some_and(|t| t.next_fire_time.is_some()))
    }

    /// Set the state of a stored trigger scored by its stored fire time.
    async fn set_stored_trigger_state(
        &self,
        key: &TriggerKey,
        state: TriggerState,
    ) -> Result<()> {
        if let Some(trigger) = self.load_trigger(key).await? {
            self.set_state(&trigger, state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_fire_tests.rs"]
mod tests;
