//! The job store engine.
//!
//! Operations are split by concern across the `store_*` submodules; this
//! file holds the shared state and the record loaders they build on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use triggerstore_kv::{Clock, KvStore, SystemClock};

use crate::calendar::Calendar;
use crate::codec;
use crate::config::JobStoreConfig;
use crate::error::{JobStoreError, Result};
use crate::job::JobDetail;
use crate::keys::{JobKey, TriggerKey};
use crate::lease::LeaseManager;
use crate::matcher::GroupMatcher;
use crate::schema::KeySchema;
use crate::signaler::SchedulerSignaler;
use crate::state::{StateIndex, TriggerState, score_of_time};
use crate::trigger::Trigger;

#[path = "store_acquire.rs"]
mod acquire;
#[path = "store_calendars.rs"]
mod calendars;
#[path = "store_fire.rs"]
mod fire;
#[path = "store_jobs.rs"]
mod jobs;
#[path = "store_pause.rs"]
mod pause;
#[path = "store_triggers.rs"]
mod triggers;

/// Distributed job store over a shared [`KvStore`].
///
/// Several instances, each with its own `instance_id`, may run against the
/// same store. Nothing is cached in process: every call re-reads the
/// records it needs.
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KvStore>,
    schema: KeySchema,
    states: StateIndex,
    leases: LeaseManager,
    clock: Arc<dyn Clock>,
    signaler: Arc<dyn SchedulerSignaler>,
    config: JobStoreConfig,
}

impl JobStore {
    /// Create a store on the wall clock.
    pub fn new(
        config: JobStoreConfig,
        kv: Arc<dyn KvStore>,
        signaler: Arc<dyn SchedulerSignaler>,
    ) -> Self {
        Self::with_clock(config, kv, Arc::new(SystemClock), signaler)
    }

    /// Create a store driven by `clock`.
    pub fn with_clock(
        config: JobStoreConfig,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        signaler: Arc<dyn SchedulerSignaler>,
    ) -> Self {
        let schema = KeySchema::new(config.key_prefix.clone(), config.key_delimiter.clone());
        let states = StateIndex::new(kv.clone(), schema.clone());
        let leases = LeaseManager::new(
            kv.clone(),
            schema.clone(),
            clock.clone(),
            config.instance_id.clone(),
            config.trigger_lock_timeout(),
            config.lock_timeout(),
        );
        Self {
            kv,
            schema,
            states,
            leases,
            clock,
            signaler,
            config,
        }
    }

    pub fn config(&self) -> &JobStoreConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn state_index(&self) -> &StateIndex {
        &self.states
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn misfire_threshold_ms(&self) -> i64 {
        i64::try_from(self.config.misfire_threshold_ms).unwrap_or(i64::MAX)
    }

    fn check_group(&self, group: &str) -> Result<()> {
        if self.schema.is_valid_group(group) {
            return Ok(());
        }
        Err(JobStoreError::InvalidGroupName {
            group: group.to_string(),
            delimiter: self.schema.delimiter().to_string(),
        })
    }

    // --- record loaders --------------------------------------------------

    async fn load_job(&self, key: &JobKey) -> Result<Option<JobDetail>> {
        let hash_key = self.schema.job_hash_key(key);
        let fields = self.kv.hash_get_all(&hash_key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let data = self.kv.hash_get_all(&self.schema.job_data_key(key)).await?;
        codec::decode_job(key.clone(), &hash_key, &fields, data).map(Some)
    }

    async fn load_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>> {
        let hash_key = self.schema.trigger_hash_key(key);
        let fields = self.kv.hash_get_all(&hash_key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        codec::decode_trigger(&self.schema, key.clone(), &hash_key, &fields).map(Some)
    }

    async fn load_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        let hash_key = self.schema.calendar_hash_key(name);
        let fields = self.kv.hash_get_all(&hash_key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        codec::decode_calendar(&hash_key, &fields).map(Some)
    }

    async fn trigger_calendar(&self, trigger: &Trigger) -> Result<Option<Calendar>> {
        match &trigger.calendar_name {
            Some(name) => self.load_calendar(name).await,
            None => Ok(None),
        }
    }

    async fn persist_trigger(&self, trigger: &Trigger) -> Result<()> {
        let hash_key = self.schema.trigger_hash_key(&trigger.key);
        self.kv
            .hash_set(&hash_key, &codec::encode_trigger(&self.schema, trigger))
            .await?;
        debug!("Persisted trigger '{}'", trigger.key);
        Ok(())
    }

    async fn set_state(&self, trigger: &Trigger, state: TriggerState) -> Result<()> {
        self.states
            .set_state(&trigger.key, state, score_of_time(trigger.next_fire_time))
            .await
    }

    async fn job_trigger_keys(&self, job: &JobKey) -> Result<Vec<TriggerKey>> {
        let members = self
            .kv
            .set_members(&self.schema.job_triggers_set_key(job))
            .await?;
        Ok(members
            .iter()
            .filter_map(|m| self.schema.trigger_key_from_hash_key(m))
            .collect())
    }

    /// Group names in `groups_set_key` selected by `matcher`.
    async fn matching_groups(
        &self,
        groups_set_key: &str,
        matcher: &GroupMatcher,
    ) -> Result<Vec<String>> {
        if let Some(group) = matcher.exact() {
            return Ok(vec![group.to_string()]);
        }
        let groups = self.kv.set_members(groups_set_key).await?;
        Ok(groups
            .into_iter()
            .filter(|g| matcher.is_match(g))
            .collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
