//! Fixtures shared by the store tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use triggerstore_kv::{Clock, ManualClock, MemoryKvStore};

use crate::config::JobStoreConfig;
use crate::job::JobDetail;
use crate::keys::{JobKey, TriggerKey};
use crate::schedule::REPEAT_INDEFINITELY;
use crate::signaler::RecordingSignaler;
use crate::store::JobStore;
use crate::trigger::Trigger;

pub(crate) const INSTANCE: &str = "node-a";

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// A memory store, a manual clock and a recording signaler.
pub(crate) struct Harness {
    pub kv: MemoryKvStore,
    pub clock: Arc<ManualClock>,
    pub signaler: Arc<RecordingSignaler>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        Self {
            kv: MemoryKvStore::with_clock(clock.clone()),
            clock,
            signaler: Arc::new(RecordingSignaler::new()),
        }
    }

    pub fn config(instance: &str) -> JobStoreConfig {
        JobStoreConfig {
            key_prefix: "ts".to_string(),
            key_delimiter: ":".to_string(),
            instance_id: instance.to_string(),
            misfire_threshold_ms: 60_000,
            trigger_lock_timeout_ms: 300_000,
            lock_timeout_ms: 30_000,
        }
    }

    pub fn store(&self) -> JobStore {
        self.store_for(INSTANCE)
    }

    pub fn store_for(&self, instance: &str) -> JobStore {
        self.store_with(Self::config(instance))
    }

    pub fn store_with(&self, config: JobStoreConfig) -> JobStore {
        JobStore::with_clock(
            config,
            Arc::new(self.kv.clone()),
            self.clock.clone(),
            self.signaler.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub(crate) fn job(name: &str) -> JobDetail {
    JobDetail::new(JobKey::named(name), "test::Job")
}

pub(crate) fn exclusive_job(name: &str) -> JobDetail {
    job(name).with_concurrent_execution_disallowed(true)
}

/// Trigger firing at `at` and every ten minutes after.
pub(crate) fn repeating(name: &str, job: &JobDetail, at: DateTime<Utc>) -> Trigger {
    Trigger::simple(
        TriggerKey::named(name),
        job.key.clone(),
        at,
        Duration::minutes(10),
        REPEAT_INDEFINITELY,
    )
}

/// Trigger firing once at `at`.
pub(crate) fn one_shot(name: &str, job: &JobDetail, at: DateTime<Utc>) -> Trigger {
    Trigger::simple(
        TriggerKey::named(name),
        job.key.clone(),
        at,
        Duration::zero(),
        0,
    )
}
