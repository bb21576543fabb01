//! Trigger leases, instance liveness and sweep throttling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use triggerstore_kv::{Clock, KvStore};

use crate::error::Result;
use crate::keys::{JobKey, TriggerKey};
use crate::schema::KeySchema;

/// Lease bookkeeping for one scheduler instance.
///
/// Leases are advisory: failing to obtain one is a normal outcome, and a
/// crashed holder is only noticed once its TTL runs out.
#[derive(Clone)]
pub struct LeaseManager {
    kv: Arc<dyn KvStore>,
    schema: KeySchema,
    clock: Arc<dyn Clock>,
    instance_id: String,
    trigger_ttl: Duration,
    lock_ttl: Duration,
}

impl LeaseManager {
    pub fn new(
        kv: Arc<dyn KvStore>,
        schema: KeySchema,
        clock: Arc<dyn Clock>,
        instance_id: impl Into<String>,
        trigger_ttl: Duration,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            kv,
            schema,
            clock,
            instance_id: instance_id.into(),
            trigger_ttl,
            lock_ttl,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    // --- trigger leases --------------------------------------------------

    /// Lease a trigger for this instance. Re-leasing an own lease refreshes it.
    pub async fn take_trigger_lease(&self, key: &TriggerKey) -> Result<bool> {
        let lock_key = self.schema.trigger_lock_key(key);
        if self
            .kv
            .string_set_if_absent(&lock_key, &self.instance_id, Some(self.trigger_ttl))
            .await?
        {
            return Ok(true);
        }
        if self.kv.string_get(&lock_key).await?.as_deref() == Some(self.instance_id.as_str()) {
            self.kv
                .string_set(&lock_key, &self.instance_id, Some(self.trigger_ttl))
                .await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop a trigger's lease whoever holds it.
    pub async fn release_trigger_lease(&self, key: &TriggerKey) -> Result<bool> {
        Ok(self.kv.delete(&self.schema.trigger_lock_key(key)).await?)
    }

    pub async fn trigger_lease_holder(&self, key: &TriggerKey) -> Result<Option<String>> {
        Ok(self.kv.string_get(&self.schema.trigger_lock_key(key)).await?)
    }

    /// Whether a trigger's lease is unexpired and its holder is alive.
    pub async fn is_trigger_lease_live(&self, key: &TriggerKey) -> Result<bool> {
        match self.trigger_lease_holder(key).await? {
            Some(holder) => self.is_instance_alive(&holder).await,
            None => Ok(false),
        }
    }

    // --- instance liveness -----------------------------------------------

    /// Refresh this instance's liveness lease.
    pub async fn heartbeat(&self) -> Result<()> {
        let now = self.clock.now_millis().to_string();
        self.kv
            .string_set(
                &self.schema.instance_lease_key(&self.instance_id),
                &now,
                Some(self.trigger_ttl),
            )
            .await?;
        Ok(())
    }

    pub async fn is_instance_alive(&self, instance_id: &str) -> Result<bool> {
        if instance_id == self.instance_id {
            return Ok(true);
        }
        Ok(self
            .kv
            .exists(&self.schema.instance_lease_key(instance_id))
            .await?)
    }

    // --- job blocking ----------------------------------------------------

    /// Record that this instance is running a non-concurrent job.
    pub async fn block_job(&self, job: &JobKey) -> Result<()> {
        self.kv
            .set_add(&self.schema.blocked_jobs_set_key(), &self.schema.job_hash_key(job))
            .await?;
        self.kv
            .string_set(&self.schema.job_blocked_key(job), &self.instance_id, None)
            .await?;
        Ok(())
    }

    pub async fn unblock_job(&self, job: &JobKey) -> Result<()> {
        self.kv
            .set_remove(&self.schema.blocked_jobs_set_key(), &self.schema.job_hash_key(job))
            .await?;
        self.kv.delete(&self.schema.job_blocked_key(job)).await?;
        Ok(())
    }

    pub async fn is_job_blocked(&self, job: &JobKey) -> Result<bool> {
        Ok(self
            .kv
            .set_contains(&self.schema.blocked_jobs_set_key(), &self.schema.job_hash_key(job))
            .await?)
    }

    /// Whether the job is blocked by an instance that is still alive.
    /// A marker left by a dead instance is cleared.
    pub async fn is_job_blocked_by_live_instance(&self, job: &JobKey) -> Result<bool> {
        if !self.is_job_blocked(job).await? {
            return Ok(false);
        }
        let blocker = self.kv.string_get(&self.schema.job_blocked_key(job)).await?;
        let alive = match blocker.as_deref() {
            Some(instance) => self.is_instance_alive(instance).await?,
            None => false,
        };
        if !alive {
            warn!(
                "Job '{}' was blocked by dead instance {:?}; clearing",
                job, blocker
            );
            self.unblock_job(job).await?;
        }
        Ok(alive)
    }

    // --- sweep throttle --------------------------------------------------

    /// Claim the next recovery sweep.
    ///
    /// Returns `true` when more than one trigger lease TTL has passed since
    /// the last sweep, recording now as the new sweep time. The read and
    /// write happen under the global lock; when another instance holds it
    /// the sweep is skipped.
    pub async fn try_begin_sweep(&self) -> Result<bool> {
        let lock_key = self.schema.lock_key();
        if !self
            .kv
            .lock_take(&lock_key, &self.instance_id, self.lock_ttl)
            .await?
        {
            debug!("Global lock busy, skipping recovery sweep");
            return Ok(false);
        }

        let claimed = self.claim_sweep_slot().await;
        self.kv.lock_release(&lock_key, &self.instance_id).await?;
        claimed
    }

    async fn claim_sweep_slot(&self) -> Result<bool> {
        let sweep_key = self.schema.last_sweep_key();
        let now = self.clock.now_millis();
        let last = self
            .kv
            .string_get(&sweep_key)
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let interval = i64::try_from(self.trigger_ttl.as_millis()).unwrap_or(i64::MAX);
        if now - last <= interval {
            return Ok(false);
        }
        self.kv.string_set(&sweep_key, &now.to_string(), None).await?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
