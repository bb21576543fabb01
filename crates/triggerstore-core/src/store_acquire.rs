//! Acquisition, misfire repair and the recovery sweep.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::JobStore;
use crate::codec;
use crate::error::Result;
use crate::keys::TriggerKey;
use crate::state::{NO_FIRE_TIME_SCORE, TriggerState, score_of_time};
use crate::trigger::Trigger;

impl JobStore {
    /// Hand out up to `max_count` waiting triggers due by
    /// `no_later_than + time_window`, earliest first.
    ///
    /// Misfired candidates are repaired in place and kept when their new
    /// fire time is still inside the window. At most one trigger per
    /// non-concurrent job is returned, and none whose job is running.
    pub async fn acquire_next_triggers(
        &self,
        no_later_than: DateTime<Utc>,
        max_count: usize,
        time_window: Duration,
    ) -> Result<Vec<Trigger>> {
        self.leases.heartbeat().await?;
        if self.leases.try_begin_sweep().await? {
            self.release_orphaned_triggers().await?;
        }

        let horizon = no_later_than + time_window;
        let candidates = self
            .states
            .query_due(TriggerState::Waiting, score_of_time(Some(horizon)), max_count)
            .await?;

        let mut acquired: Vec<Trigger> = Vec::new();
        let mut exclusive_jobs = HashSet::new();

        for (key, _) in candidates {
            let Some(mut trigger) = self.load_trigger(&key).await? else {
                warn!("Waiting trigger '{}' has no record; dropping its state", key);
                self.states.clear_state(&key).await?;
                continue;
            };

            if self.apply_misfire(&mut trigger).await? {
                debug!(
                    "Trigger '{}' misfired, next fire time now {:?}",
                    key, trigger.next_fire_time
                );
            }
            let Some(next) = trigger.next_fire_time else {
                if self.states.is_in(&key, TriggerState::Waiting).await? {
                    self.states.clear_state(&key).await?;
                }
                continue;
            };
            if next > horizon {
                continue;
            }

            let Some(job) = self.load_job(&trigger.job_key).await? else {
                warn!(
                    "Trigger '{}' references missing job '{}'; marking as error",
                    key, trigger.job_key
                );
                self.set_state(&trigger, TriggerState::Error).await?;
                continue;
            };

            if job.concurrent_execution_disallowed {
                if exclusive_jobs.contains(&job.key) {
                    continue;
                }
                if self.leases.is_job_blocked_by_live_instance(&job.key).await? {
                    self.set_state(&trigger, TriggerState::Blocked).await?;
                    continue;
                }
            }

            if !self.leases.take_trigger_lease(&key).await? {
                debug!("Trigger '{}' is leased by another instance", key);
                continue;
            }
            let waiting_score = self.states.score_of(&key, TriggerState::Waiting).await?;
            if waiting_score != Some(score_of_time(Some(next))) {
                warn!("Trigger '{}' changed during acquisition; skipping", key);
                self.leases.release_trigger_lease(&key).await?;
                continue;
            }

            self.set_state(&trigger, TriggerState::Acquired).await?;
            let fire_instance_id = uuid::Uuid::new_v4().to_string();
            self.kv
                .hash_set(
                    &self.schema.trigger_hash_key(&key),
                    &[(codec::FIRE_INSTANCE_ID.to_string(), fire_instance_id.clone())],
                )
                .await?;
            trigger.fire_instance_id = Some(fire_instance_id);

            if job.concurrent_execution_disallowed {
                exclusive_jobs.insert(job.key.clone());
            }
            acquired.push(trigger);
        }

        acquired.sort_by_key(|t| t.next_fire_time);
        if !acquired.is_empty() {
            debug!("Acquired {} trigger(s)", acquired.len());
        }
        Ok(acquired)
    }

    /// Return an acquired trigger to `Waiting` without firing it.
    pub async fn release_acquired_trigger(&self, key: &TriggerKey) -> Result<()> {
        if let Some(score) = self.states.score_of(key, TriggerState::Acquired).await? {
            self.states
                .set_state(key, TriggerState::Waiting, score)
                .await?;
        }
        self.leases.release_trigger_lease(key).await?;
        Ok(())
    }

    /// Repair a trigger whose fire time passed beyond the misfire threshold.
    ///
    /// Notifies the misfire listener, recomputes and persists the schedule,
    /// and completes the trigger when no fire time is left. Returns whether
    /// the next fire time changed.
    pub async fn apply_misfire(&self, trigger: &mut Trigger) -> Result<bool> {
        let now = self.now();
        if !trigger.is_misfired(now, self.misfire_threshold_ms()) {
            return Ok(false);
        }

        let calendar = self.trigger_calendar(trigger).await?;
        self.signaler.notify_trigger_listeners_misfired(trigger).await;

        let before = trigger.next_fire_time;
        trigger.update_after_misfire(calendar.as_ref(), now)?;
        self.persist_trigger(trigger).await?;

        if !trigger.may_fire_again() {
            self.states
                .set_state(&trigger.key, TriggerState::Completed, NO_FIRE_TIME_SCORE)
                .await?;
            self.signaler
                .notify_scheduler_listeners_finalized(trigger)
                .await;
        } else if before != trigger.next_fire_time {
            if let Some(state) = self.states.current_state(&trigger.key).await? {
                self.set_state(trigger, state).await?;
            }
        }
        Ok(before != trigger.next_fire_time)
    }

    /// Reclaim triggers stranded by instances that stopped heartbeating.
    ///
    /// Acquired triggers without a live lease go back to `Waiting`.
    /// Blocked and paused-blocked triggers whose job is no longer blocked by
    /// a live instance go back to `Waiting` and `Paused`. Returns how many
    /// triggers moved.
    pub async fn release_orphaned_triggers(&self) -> Result<usize> {
        let mut released = 0;

        for (key, score) in self.states.entries(TriggerState::Acquired).await? {
            if self.leases.is_trigger_lease_live(&key).await? {
                continue;
            }
            self.states
                .set_state(&key, TriggerState::Waiting, score)
                .await?;
            self.leases.release_trigger_lease(&key).await?;
            released += 1;
        }

        for (from, to) in [
            (TriggerState::Blocked, TriggerState::Waiting),
            (TriggerState::PausedBlocked, TriggerState::Paused),
        ] {
            for (key, score) in self.states.entries(from).await? {
                let Some(trigger) = self.load_trigger(&key).await? else {
                    self.states.clear_state(&key).await?;
                    continue;
                };
                if self
                    .leases
                    .is_job_blocked_by_live_instance(&trigger.job_key)
                    .await?
                {
                    continue;
                }
                self.states.set_state(&key, to, score).await?;
                released += 1;
            }
        }

        if released > 0 {
            info!("Recovery sweep released {} orphaned trigger(s)", released);
        }
        Ok(released)
    }
}

#[cfg(test)]
#[path = "store_acquire_tests.rs"]
mod tests;
