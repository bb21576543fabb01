//! Pause and resume of triggers, jobs and their groups.
//!
//! Trigger groups and job groups are paused independently. A paused group
//! is remembered, so triggers stored into it later start out paused.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::JobStore;
use crate::error::Result;
use crate::keys::{JobKey, TriggerKey};
use crate::matcher::GroupMatcher;
use crate::state::TriggerState;

impl JobStore {
    /// Pause one trigger. Completed and unknown triggers are left alone.
    pub async fn pause_trigger(&self, key: &TriggerKey) -> Result<()> {
        let Some(trigger) = self.load_trigger(key).await? else {
            return Ok(());
        };
        let current = self.states.current_state(key).await?;
        if matches!(current, Some(TriggerState::Completed)) {
            return Ok(());
        }
        let blocked = current == Some(TriggerState::Blocked)
            || current == Some(TriggerState::PausedBlocked)
            || self.leases.is_job_blocked(&trigger.job_key).await?;
        let state = if blocked {
            TriggerState::PausedBlocked
        } else {
            TriggerState::Paused
        };
        self.set_state(&trigger, state).await?;
        debug!("Paused trigger '{}'", key);
        Ok(())
    }

    /// Pause every trigger group selected by `matcher`. Returns the groups.
    pub async fn pause_triggers(&self, matcher: &GroupMatcher) -> Result<Vec<String>> {
        let groups = self
            .matching_groups(&self.schema.trigger_groups_set_key(), matcher)
            .await?;
        let paused_key = self.schema.paused_trigger_groups_set_key();
        for group in &groups {
            if !self.kv.set_add(&paused_key, group).await? {
                continue;
            }
            for key in self.trigger_keys_in_group(group).await? {
                self.pause_trigger(&key).await?;
            }
            info!("Paused trigger group '{}'", group);
        }
        Ok(groups)
    }

    /// Pause every trigger of one job.
    pub async fn pause_job(&self, key: &JobKey) -> Result<()> {
        for trigger in self.job_trigger_keys(key).await? {
            self.pause_trigger(&trigger).await?;
        }
        Ok(())
    }

    /// Pause every job group selected by `matcher`. Returns the groups.
    pub async fn pause_jobs(&self, matcher: &GroupMatcher) -> Result<Vec<String>> {
        let groups = self
            .matching_groups(&self.schema.job_groups_set_key(), matcher)
            .await?;
        let paused_key = self.schema.paused_job_groups_set_key();
        for group in &groups {
            if !self.kv.set_add(&paused_key, group).await? {
                continue;
            }
            for job in self.job_keys_in_group(group).await? {
                self.pause_job(&job).await?;
            }
            info!("Paused job group '{}'", group);
        }
        Ok(groups)
    }

    /// Resume a paused trigger into `Waiting`, or `Blocked` when its job is
    /// running, then repair a fire time missed while paused.
    pub async fn resume_trigger(&self, key: &TriggerKey) -> Result<()> {
        let Some(mut trigger) = self.load_trigger(key).await? else {
            return Ok(());
        };
        let paused = self
            .states
            .current_state(key)
            .await?
            .is_some_and(TriggerState::is_paused);
        if !paused {
            return Ok(());
        }
        if !trigger.may_fire_again() {
            self.states.clear_state(key).await?;
            return Ok(());
        }

        let state = if self.leases.is_job_blocked(&trigger.job_key).await? {
            TriggerState::Blocked
        } else {
            TriggerState::Waiting
        };
        self.set_state(&trigger, state).await?;
        self.apply_misfire(&mut trigger).await?;
        debug!("Resumed trigger '{}'", key);
        Ok(())
    }

    /// Resume every trigger group selected by `matcher`. Returns the groups.
    pub async fn resume_triggers(&self, matcher: &GroupMatcher) -> Result<Vec<String>> {
        let paused_key = self.schema.paused_trigger_groups_set_key();
        let groups = self
            .matching_groups_with_paused(&self.schema.trigger_groups_set_key(), &paused_key, matcher)
            .await?;
        for group in &groups {
            self.kv.set_remove(&paused_key, group).await?;
            for key in self.trigger_keys_in_group(group).await? {
                self.resume_trigger(&key).await?;
            }
            info!("Resumed trigger group '{}'", group);
        }
        Ok(groups)
    }

    /// Resume every trigger of one job.
    pub async fn resume_job(&self, key: &JobKey) -> Result<()> {
        for trigger in self.job_trigger_keys(key).await? {
            self.resume_trigger(&trigger).await?;
        }
        Ok(())
    }

    /// Resume every job group selected by `matcher`. Returns the groups.
    pub async fn resume_jobs(&self, matcher: &GroupMatcher) -> Result<Vec<String>> {
        let paused_key = self.schema.paused_job_groups_set_key();
        let groups = self
            .matching_groups_with_paused(&self.schema.job_groups_set_key(), &paused_key, matcher)
            .await?;
        for group in &groups {
            self.kv.set_remove(&paused_key, group).await?;
            for job in self.job_keys_in_group(group).await? {
                self.resume_job(&job).await?;
            }
            info!("Resumed job group '{}'", group);
        }
        Ok(groups)
    }

    /// Pause every trigger group.
    pub async fn pause_all(&self) -> Result<()> {
        self.pause_triggers(&GroupMatcher::Anything).await?;
        Ok(())
    }

    /// Resume every trigger group and forget paused job groups.
    pub async fn resume_all(&self) -> Result<()> {
        self.kv
            .delete(&self.schema.paused_job_groups_set_key())
            .await?;
        self.resume_triggers(&GroupMatcher::Anything).await?;
        Ok(())
    }

    pub async fn get_paused_trigger_groups(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .set_members(&self.schema.paused_trigger_groups_set_key())
            .await?)
    }

    pub async fn get_paused_job_groups(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .set_members(&self.schema.paused_job_groups_set_key())
            .await?)
    }

    pub async fn is_trigger_group_paused(&self, group: &str) -> Result<bool> {
        Ok(self
            .kv
            .set_contains(&self.schema.paused_trigger_groups_set_key(), group)
            .await?)
    }

    pub async fn is_job_group_paused(&self, group: &str) -> Result<bool> {
        Ok(self
            .kv
            .set_contains(&self.schema.paused_job_groups_set_key(), group)
            .await?)
    }

    async fn trigger_keys_in_group(&self, group: &str) -> Result<Vec<TriggerKey>> {
        self.get_trigger_keys(&GroupMatcher::equals(group)).await
    }

    async fn job_keys_in_group(&self, group: &str) -> Result<Vec<JobKey>> {
        self.get_job_keys(&GroupMatcher::equals(group)).await
    }

    /// Matching groups among the known and the paused ones; a paused group
    /// may have lost all of its members.
    async fn matching_groups_with_paused(
        &self,
        groups_set_key: &str,
        paused_set_key: &str,
        matcher: &GroupMatcher,
    ) -> Result<Vec<String>> {
        let mut groups: BTreeSet<String> = self
            .matching_groups(groups_set_key, matcher)
            .await?
            .into_iter()
            .collect();
        groups.extend(self.matching_groups(paused_set_key, matcher).await?);
        Ok(groups.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "store_pause_tests.rs"]
mod tests;
