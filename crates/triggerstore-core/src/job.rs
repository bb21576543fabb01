//! Job definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::JobKey;

/// A stored job definition.
///
/// `job_type` names the executable the external executor resolves; the
/// store never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: JobKey,
    pub job_type: String,
    pub description: Option<String>,
    /// Keep the job when it has no triggers left.
    pub durable: bool,
    pub requests_recovery: bool,
    pub concurrent_execution_disallowed: bool,
    pub persist_job_data_after_execution: bool,
    pub job_data: BTreeMap<String, String>,
}

impl JobDetail {
    pub fn new(key: JobKey, job_type: impl Into<String>) -> Self {
        Self {
            key,
            job_type: job_type.into(),
            description: None,
            durable: false,
            requests_recovery: false,
            concurrent_execution_disallowed: false,
            persist_job_data_after_execution: false,
            job_data: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_requests_recovery(mut self, requests_recovery: bool) -> Self {
        self.requests_recovery = requests_recovery;
        self
    }

    pub fn with_concurrent_execution_disallowed(mut self, disallowed: bool) -> Self {
        self.concurrent_execution_disallowed = disallowed;
        self
    }

    pub fn with_persist_job_data_after_execution(mut self, persist: bool) -> Self {
        self.persist_job_data_after_execution = persist;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.job_data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let job = JobDetail::new(JobKey::named("j"), "app::Cleanup")
            .with_description("cleanup")
            .with_durable(true)
            .with_concurrent_execution_disallowed(true)
            .with_data("retries", "3");

        assert_eq!(job.key.group, "DEFAULT");
        assert!(job.durable);
        assert!(job.concurrent_execution_disallowed);
        assert!(!job.requests_recovery);
        assert_eq!(job.job_data.get("retries").map(String::as_str), Some("3"));
    }
}
