//! Multi-instance simulation.
//!
//! Starts several scheduler nodes, each with its own instance id, polling
//! one shared in-memory store. Every node acquires due triggers, fires
//! them, "runs" the job by logging it and reports completion. A node can
//! be crashed part way through so the survivors' recovery sweep has
//! something to reclaim.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use triggerstore_core::{
    CompletedExecutionInstruction, JobDetail, JobKey, JobStore, JobStoreConfig, REPEAT_INDEFINITELY,
    Result, SchedulerSignaler, Trigger, TriggerKey, TriggerState,
};
use triggerstore_kv::MemoryKvStore;

const GROUP: &str = "simulation";

/// Upper bound on triggers one node acquires per poll.
const MAX_BATCH: usize = 8;

pub(crate) struct SimulationOptions {
    pub instances: usize,
    pub jobs: usize,
    pub duration: Duration,
    pub poll_interval: Duration,
    pub crash_after: Option<Duration>,
}

/// Signaler that reports store notifications to the log.
struct LogSignaler {
    instance_id: String,
}

#[async_trait]
impl SchedulerSignaler for LogSignaler {
    async fn notify_trigger_listeners_misfired(&self, trigger: &Trigger) {
        warn!("[{}] Trigger '{}' misfired", self.instance_id, trigger.key);
    }

    async fn notify_scheduler_listeners_finalized(&self, trigger: &Trigger) {
        info!("[{}] Trigger '{}' finalized", self.instance_id, trigger.key);
    }

    async fn notify_scheduler_listeners_job_deleted(&self, job: &JobKey) {
        info!("[{}] Job '{}' deleted", self.instance_id, job);
    }

    async fn signal_scheduling_change(&self, candidate: Option<DateTime<Utc>>) {
        debug!("[{}] Scheduling changed ({:?})", self.instance_id, candidate);
    }
}

/// One scheduler instance polling the shared store.
struct SchedulerNode {
    store: JobStore,
    running: AtomicBool,
    fired: AtomicU64,
}

impl SchedulerNode {
    fn new(store: JobStore) -> Self {
        Self {
            store,
            running: AtomicBool::new(false),
            fired: AtomicU64::new(0),
        }
    }

    /// Start the polling loop in a background task.
    fn start(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let this = self.clone();

        tokio::spawn(async move {
            let id = this.store.instance_id().to_string();
            info!("Node {} started (interval={}ms)", id, interval.as_millis());

            while this.running.load(Ordering::SeqCst) {
                match this.tick().await {
                    Ok(0) => {}
                    Ok(fired) => debug!("Node {} fired {} trigger(s)", id, fired),
                    Err(e) => warn!("Node {} poll failed: {}", id, e),
                }
                tokio::time::sleep(interval).await;
            }

            info!("Node {} stopped", id);
        })
    }

    /// One acquire / fire / complete cycle. Returns how many triggers fired.
    async fn tick(&self) -> Result<usize> {
        let acquired = self
            .store
            .acquire_next_triggers(Utc::now(), MAX_BATCH, chrono::Duration::zero())
            .await?;
        if acquired.is_empty() {
            return Ok(0);
        }

        let bundles = self.store.triggers_fired(&acquired).await?;
        for bundle in &bundles {
            info!(
                "[{}] Running job '{}' for trigger '{}' (scheduled {:?}, next {:?})",
                self.store.instance_id(),
                bundle.job.key,
                bundle.trigger.key,
                bundle.scheduled_fire_time,
                bundle.next_fire_time
            );
            self.store
                .triggered_job_complete(
                    &bundle.trigger,
                    &bundle.job,
                    CompletedExecutionInstruction::NoInstruction,
                )
                .await?;
        }
        self.fired.fetch_add(bundles.len() as u64, Ordering::SeqCst);
        Ok(bundles.len())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Run the simulation to completion and log a summary.
pub(crate) async fn run(config: JobStoreConfig, options: SimulationOptions) -> Result<()> {
    let kv = Arc::new(MemoryKvStore::new());
    let nodes: Vec<Arc<SchedulerNode>> = (0..options.instances.max(1))
        .map(|i| {
            let instance_id = format!("{}-{}", config.instance_id, i);
            let signaler = Arc::new(LogSignaler {
                instance_id: instance_id.clone(),
            });
            let store = JobStore::new(config.clone().with_instance_id(instance_id), kv.clone(), signaler);
            Arc::new(SchedulerNode::new(store))
        })
        .collect();

    seed(&nodes[0].store, options.jobs).await?;

    let handles: Vec<JoinHandle<()>> = nodes
        .iter()
        .map(|node| node.start(options.poll_interval))
        .collect();

    match options.crash_after.filter(|at| *at < options.duration) {
        Some(crash_after) => {
            tokio::time::sleep(crash_after).await;
            warn!("Crashing node {}", nodes[0].store.instance_id());
            handles[0].abort();
            tokio::time::sleep(options.duration - crash_after).await;
        }
        None => tokio::time::sleep(options.duration).await,
    }

    for node in &nodes {
        node.stop();
    }
    for handle in handles {
        // an aborted node reports a cancelled join
        let _ = handle.await;
    }

    report(&nodes).await
}

/// Store the simulated jobs: one fixed-interval trigger each, plus a cron
/// trigger on the first job.
async fn seed(store: &JobStore, jobs: usize) -> Result<()> {
    let now = Utc::now();
    for i in 0..jobs {
        let job = JobDetail::new(JobKey::new(format!("job-{i}"), GROUP), "simulate::LogJob")
            .with_durable(true)
            .with_concurrent_execution_disallowed(i % 2 == 0);
        let interval = chrono::Duration::seconds(1 + (i % 3) as i64);
        let trigger = Trigger::simple(
            TriggerKey::new(format!("every-{i}"), GROUP),
            job.key.clone(),
            now,
            interval,
            REPEAT_INDEFINITELY,
        );
        store.store_job_and_trigger(&job, &trigger).await?;
    }

    if jobs > 0 {
        let mut cron = Trigger::cron(
            TriggerKey::new("cron-0", GROUP),
            JobKey::new("job-0", GROUP),
            "*/5 * * * * *",
            now,
        );
        cron.compute_first_fire_time(None)?;
        store.store_trigger(&cron, false).await?;
    }

    info!("Seeded {} job(s)", store.number_of_jobs().await?);
    Ok(())
}

async fn report(nodes: &[Arc<SchedulerNode>]) -> Result<()> {
    for node in nodes {
        info!(
            "Node {} fired {} trigger(s)",
            node.store.instance_id(),
            node.fired.load(Ordering::SeqCst)
        );
    }

    let states = nodes[0].store.state_index();
    for state in TriggerState::ALL {
        let count = states.entries(state).await?.len();
        if count > 0 {
            info!("{} trigger(s) {}", count, state);
        }
    }
    Ok(())
}
