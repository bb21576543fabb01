//! Trigger operations.

use tracing::{debug, info};

use super::JobStore;
use crate::codec;
use crate::error::{JobStoreError, Result};
use crate::keys::{JobKey, TriggerKey};
use crate::matcher::GroupMatcher;
use crate::schedule::ScheduleCapability;
use crate::state::{TriggerState, TriggerStatus};
use crate::trigger::Trigger;

impl JobStore {
    /// Store a trigger and place it in the state its groups and job imply.
    pub async fn store_trigger(&self, trigger: &Trigger, replace_existing: bool) -> Result<()> {
        self.check_group(&trigger.key.group)?;
        trigger.schedule.validate()?;

        let hash_key = self.schema.trigger_hash_key(&trigger.key);
        let previous = self.load_trigger(&trigger.key).await?;
        if previous.is_some() && !replace_existing {
            return Err(JobStoreError::AlreadyExists {
                kind: "Trigger",
                key: trigger.key.to_string(),
            });
        }
        if !self.check_job_exists(&trigger.job_key).await? {
            return Err(JobStoreError::Persistence(format!(
                "Trigger '{}' references missing job '{}'",
                trigger.key, trigger.job_key
            )));
        }
        if let Some(name) = &trigger.calendar_name {
            if !self.check_calendar_exists(name).await? {
                return Err(JobStoreError::Persistence(format!(
                    "Trigger '{}' references missing calendar '{}'",
                    trigger.key, name
                )));
            }
        }

        if let Some(old) = &previous {
            if old.job_key != trigger.job_key {
                self.kv
                    .set_remove(&self.schema.job_triggers_set_key(&old.job_key), &hash_key)
                    .await?;
            }
            if let Some(old_calendar) = &old.calendar_name {
                if trigger.calendar_name.as_ref() != Some(old_calendar) {
                    self.kv
                        .set_remove(&self.schema.calendar_triggers_set_key(old_calendar), &hash_key)
                        .await?;
                }
            }
            self.states.clear_state(&trigger.key).await?;
        }

        self.kv
            .hash_set(&hash_key, &codec::encode_trigger(&self.schema, trigger))
            .await?;
        self.kv
            .set_add(&self.schema.triggers_set_key(), &hash_key)
            .await?;
        self.kv
            .set_add(&self.schema.trigger_group_set_key(&trigger.key.group), &hash_key)
            .await?;
        self.kv
            .set_add(&self.schema.trigger_groups_set_key(), &trigger.key.group)
            .await?;
        self.kv
            .set_add(&self.schema.job_triggers_set_key(&trigger.job_key), &hash_key)
            .await?;
        if let Some(name) = &trigger.calendar_name {
            self.kv
                .set_add(&self.schema.calendar_triggers_set_key(name), &hash_key)
                .await?;
        }

        let paused = self.is_trigger_group_paused(&trigger.key.group).await?
            || self.is_job_group_paused(&trigger.job_key.group).await?;
        let blocked = self.leases.is_job_blocked(&trigger.job_key).await?;
        let state = match (paused, blocked, trigger.next_fire_time.is_some()) {
            (true, true, _) => Some(TriggerState::PausedBlocked),
            (true, false, _) => Some(TriggerState::Paused),
            (false, true, true) => Some(TriggerState::Blocked),
            (false, false, true) => Some(TriggerState::Waiting),
            (false, _, false) => None,
        };
        match state {
            Some(state) => self.set_state(trigger, state).await?,
            None => debug!("Trigger '{}' has no next fire time, left without state", trigger.key),
        }

        info!("Stored trigger '{}' for job '{}'", trigger.key, trigger.job_key);
        Ok(())
    }

    /// Remove several triggers. Returns whether all of them existed.
    pub async fn remove_triggers(&self, keys: &[TriggerKey]) -> Result<bool> {
        let mut all_found = true;
        for key in keys {
            all_found &= self.remove_trigger(key, true).await?;
        }
        Ok(all_found)
    }

    /// Remove a trigger. With `remove_orphaned_job`, its job goes too when
    /// that job is non-durable and has no triggers left. Returns whether the
    /// trigger existed.
    pub async fn remove_trigger(
        &self,
        key: &TriggerKey,
        remove_orphaned_job: bool,
    ) -> Result<bool> {
        let Some(trigger) = self.load_trigger(key).await? else {
            return Ok(false);
        };
        let hash_key = self.schema.trigger_hash_key(key);

        self.kv
            .set_remove(&self.schema.triggers_set_key(), &hash_key)
            .await?;
        let group_key = self.schema.trigger_group_set_key(&key.group);
        self.kv.set_remove(&group_key, &hash_key).await?;
        if self.kv.set_len(&group_key).await? == 0 {
            self.kv
                .set_remove(&self.schema.trigger_groups_set_key(), &key.group)
                .await?;
        }
        self.kv
            .set_remove(&self.schema.job_triggers_set_key(&trigger.job_key), &hash_key)
            .await?;
        if let Some(name) = &trigger.calendar_name {
            self.kv
                .set_remove(&self.schema.calendar_triggers_set_key(name), &hash_key)
                .await?;
        }
        self.states.clear_state(key).await?;
        self.leases.release_trigger_lease(key).await?;
        self.kv.delete(&hash_key).await?;
        info!("Removed trigger '{}'", key);

        if remove_orphaned_job {
            self.remove_job_if_orphaned(&trigger.job_key).await?;
        }
        Ok(true)
    }

    async fn remove_job_if_orphaned(&self, job_key: &JobKey) -> Result<()> {
        let Some(job) = self.load_job(job_key).await? else {
            return Ok(());
        };
        if job.durable {
            return Ok(());
        }
        let remaining = self
            .kv
            .set_len(&self.schema.job_triggers_set_key(job_key))
            .await?;
        if remaining == 0 && self.delete_job_records(job_key).await? {
            self.signaler
                .notify_scheduler_listeners_job_deleted(job_key)
                .await;
        }
        Ok(())
    }

    /// Swap a stored trigger for `new_trigger`, keeping the job.
    /// Returns `false` when `old_key` is not stored.
    pub async fn replace_trigger(&self, old_key: &TriggerKey, new_trigger: &Trigger) -> Result<bool> {
        let Some(old) = self.load_trigger(old_key).await? else {
            return Ok(false);
        };
        if old.job_key != new_trigger.job_key {
            return Err(JobStoreError::Persistence(format!(
                "New trigger '{}' fires job '{}' but '{}' fires '{}'",
                new_trigger.key, new_trigger.job_key, old_key, old.job_key
            )));
        }
        new_trigger.schedule.validate()?;
        if &new_trigger.key != old_key && self.check_trigger_exists(&new_trigger.key).await? {
            return Err(JobStoreError::AlreadyExists {
                kind: "Trigger",
                key: new_trigger.key.to_string(),
            });
        }

        self.remove_trigger(old_key, false).await?;
        self.store_trigger(new_trigger, false).await?;
        Ok(true)
    }

    pub async fn retrieve_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>> {
        self.load_trigger(key).await
    }

    pub async fn check_trigger_exists(&self, key: &TriggerKey) -> Result<bool> {
        Ok(self.kv.exists(&self.schema.trigger_hash_key(key)).await?)
    }

    pub async fn number_of_triggers(&self) -> Result<usize> {
        Ok(self.kv.set_len(&self.schema.triggers_set_key()).await?)
    }

    pub async fn get_trigger_group_names(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .set_members(&self.schema.trigger_groups_set_key())
            .await?)
    }

    /// Keys of every trigger in a group selected by `matcher`.
    pub async fn get_trigger_keys(&self, matcher: &GroupMatcher) -> Result<Vec<TriggerKey>> {
        let groups = self
            .matching_groups(&self.schema.trigger_groups_set_key(), matcher)
            .await?;
        let mut keys = Vec::new();
        for group in groups {
            let members = self
                .kv
                .set_members(&self.schema.trigger_group_set_key(&group))
                .await?;
            keys.extend(
                members
                    .iter()
                    .filter_map(|m| self.schema.trigger_key_from_hash_key(m)),
            );
        }
        Ok(keys)
    }

    pub async fn get_trigger_state(&self, key: &TriggerKey) -> Result<TriggerStatus> {
        Ok(TriggerStatus::from(self.states.current_state(key).await?))
    }

    /// Remove every job, trigger and calendar, and forget paused groups.
    pub async fn clear_all_scheduling_data(&self) -> Result<()> {
        for job in self.get_job_keys(&GroupMatcher::Anything).await? {
            self.remove_job(&job).await?;
        }
        for trigger in self.get_trigger_keys(&GroupMatcher::Anything).await? {
            self.remove_trigger(&trigger, false).await?;
        }
        for calendar in self.get_calendar_names().await? {
            self.remove_calendar(&calendar).await?;
        }
        self.kv
            .delete(&self.schema.paused_trigger_groups_set_key())
            .await?;
        self.kv
            .delete(&self.schema.paused_job_groups_set_key())
            .await?;
        self.kv
            .delete(&self.schema.blocked_jobs_set_key())
            .await?;
        info!("Cleared all scheduling data");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_triggers_tests.rs"]
mod tests;
