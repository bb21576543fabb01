//! Job operations.

use tracing::info;

use super::JobStore;
use crate::codec;
use crate::error::{JobStoreError, Result};
use crate::job::JobDetail;
use crate::keys::JobKey;
use crate::matcher::GroupMatcher;
use crate::trigger::Trigger;

impl JobStore {
    /// Store a job, replacing an existing one only when `replace_existing`.
    pub async fn store_job(&self, job: &JobDetail, replace_existing: bool) -> Result<()> {
        self.check_group(&job.key.group)?;
        let hash_key = self.schema.job_hash_key(&job.key);
        if !replace_existing && self.kv.exists(&hash_key).await? {
            return Err(JobStoreError::AlreadyExists {
                kind: "Job",
                key: job.key.to_string(),
            });
        }

        self.kv.hash_set(&hash_key, &codec::encode_job(job)).await?;
        self.write_job_data(job).await?;
        self.kv.set_add(&self.schema.jobs_set_key(), &hash_key).await?;
        self.kv
            .set_add(&self.schema.job_group_set_key(&job.key.group), &hash_key)
            .await?;
        self.kv
            .set_add(&self.schema.job_groups_set_key(), &job.key.group)
            .await?;
        info!("Stored job '{}'", job.key);
        Ok(())
    }

    /// Replace the stored data map of a job.
    pub(super) async fn write_job_data(&self, job: &JobDetail) -> Result<()> {
        let data_key = self.schema.job_data_key(&job.key);
        self.kv.delete(&data_key).await?;
        self.kv
            .hash_set(&data_key, &codec::encode_job_data(job))
            .await?;
        Ok(())
    }

    /// Store a job and its first trigger. Neither may exist yet.
    pub async fn store_job_and_trigger(&self, job: &JobDetail, trigger: &Trigger) -> Result<()> {
        self.store_job(job, false).await?;
        self.store_trigger(trigger, false).await
    }

    /// Remove a job and every trigger that references it.
    pub async fn remove_job(&self, key: &JobKey) -> Result<bool> {
        for trigger_key in self.job_trigger_keys(key).await? {
            self.remove_trigger(&trigger_key, false).await?;
        }
        self.delete_job_records(key).await
    }

    /// Delete a job's own records and index entries, leaving its triggers.
    pub(super) async fn delete_job_records(&self, key: &JobKey) -> Result<bool> {
        let hash_key = self.schema.job_hash_key(key);
        let existed = self.kv.exists(&hash_key).await?;

        self.kv.delete(&hash_key).await?;
        self.kv.delete(&self.schema.job_data_key(key)).await?;
        self.kv
            .delete(&self.schema.job_triggers_set_key(key))
            .await?;
        self.kv.set_remove(&self.schema.jobs_set_key(), &hash_key).await?;

        let group_key = self.schema.job_group_set_key(&key.group);
        self.kv.set_remove(&group_key, &hash_key).await?;
        if self.kv.set_len(&group_key).await? == 0 {
            self.kv
                .set_remove(&self.schema.job_groups_set_key(), &key.group)
                .await?;
        }
        self.leases.unblock_job(key).await?;

        if existed {
            info!("Removed job '{}'", key);
        }
        Ok(existed)
    }

    /// Remove several jobs. Returns whether all of them existed.
    pub async fn remove_jobs(&self, keys: &[JobKey]) -> Result<bool> {
        let mut all_found = true;
        for key in keys {
            all_found &= self.remove_job(key).await?;
        }
        Ok(all_found)
    }

    pub async fn retrieve_job(&self, key: &JobKey) -> Result<Option<JobDetail>> {
        self.load_job(key).await
    }

    pub async fn check_job_exists(&self, key: &JobKey) -> Result<bool> {
        Ok(self.kv.exists(&self.schema.job_hash_key(key)).await?)
    }

    pub async fn number_of_jobs(&self) -> Result<usize> {
        Ok(self.kv.set_len(&self.schema.jobs_set_key()).await?)
    }

    pub async fn get_job_group_names(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .set_members(&self.schema.job_groups_set_key())
            .await?)
    }

    /// Keys of every job in a group selected by `matcher`.
    pub async fn get_job_keys(&self, matcher: &GroupMatcher) -> Result<Vec<JobKey>> {
        let groups = self
            .matching_groups(&self.schema.job_groups_set_key(), matcher)
            .await?;
        let mut keys = Vec::new();
        for group in groups {
            let members = self
                .kv
                .set_members(&self.schema.job_group_set_key(&group))
                .await?;
            keys.extend(
                members
                    .iter()
                    .filter_map(|m| self.schema.job_key_from_hash_key(m)),
            );
        }
        Ok(keys)
    }

    /// Every stored trigger that fires the job.
    pub async fn get_triggers_for_job(&self, key: &JobKey) -> Result<Vec<Trigger>> {
        let mut triggers = Vec::new();
        for trigger_key in self.job_trigger_keys(key).await? {
            if let Some(trigger) = self.load_trigger(&trigger_key).await? {
                triggers.push(trigger);
            }
        }
        Ok(triggers)
    }
}

#[cfg(test)]
#[path = "store_jobs_tests.rs"]
mod tests;
