//! Store key namespace.
//!
//! Every key is `{prefix}{d}{kind}[{d}{segment}...]` where `d` is the
//! configured delimiter. Job and trigger hash keys end in `group{d}name`;
//! they double as the members of the job/trigger index sets and of the
//! per-state ordered sets, so they must be parseable back into identities.
//! Group names therefore must not contain the delimiter; names may.

use crate::keys::{JobKey, TriggerKey};
use crate::state::TriggerState;

/// Deterministic mapping from domain identities to store keys.
#[derive(Debug, Clone)]
pub struct KeySchema {
    prefix: String,
    delimiter: String,
}

impl KeySchema {
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn key(&self, parts: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for part in parts {
            key.push_str(&self.delimiter);
            key.push_str(part);
        }
        key
    }

    /// Whether `group` round-trips through [`split_identity`](Self::split_identity).
    pub fn is_valid_group(&self, group: &str) -> bool {
        !group.is_empty() && !group.contains(self.delimiter.as_str())
    }

    /// Split `{prefix}{d}{kind}{d}group{d}name` into `(group, name)`.
    fn split_identity<'a>(&self, kind: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
        let head = self.key(&[kind]);
        let rest = key.strip_prefix(head.as_str())?;
        let rest = rest.strip_prefix(self.delimiter.as_str())?;
        let (group, name) = rest.split_once(self.delimiter.as_str())?;
        if group.is_empty() || name.is_empty() {
            return None;
        }
        Some((group, name))
    }

    // --- jobs ------------------------------------------------------------

    pub fn job_hash_key(&self, key: &JobKey) -> String {
        self.key(&["job", &key.group, &key.name])
    }

    pub fn job_data_key(&self, key: &JobKey) -> String {
        self.key(&["job_data", &key.group, &key.name])
    }

    pub fn job_key_from_hash_key(&self, hash_key: &str) -> Option<JobKey> {
        self.split_identity("job", hash_key)
            .map(|(group, name)| JobKey::new(name, group))
    }

    pub fn jobs_set_key(&self) -> String {
        self.key(&["jobs"])
    }

    pub fn job_group_set_key(&self, group: &str) -> String {
        self.key(&["job_group", group])
    }

    pub fn job_groups_set_key(&self) -> String {
        self.key(&["job_groups"])
    }

    pub fn job_triggers_set_key(&self, key: &JobKey) -> String {
        self.key(&["job_triggers", &key.group, &key.name])
    }

    pub fn blocked_jobs_set_key(&self) -> String {
        self.key(&["blocked_jobs"])
    }

    /// String key holding the instance id that blocked a job.
    pub fn job_blocked_key(&self, key: &JobKey) -> String {
        self.key(&["job_blocked", &key.group, &key.name])
    }

    pub fn paused_job_groups_set_key(&self) -> String {
        self.key(&["paused_job_groups"])
    }

    // --- triggers --------------------------------------------------------

    pub fn trigger_hash_key(&self, key: &TriggerKey) -> String {
        self.key(&["trigger", &key.group, &key.name])
    }

    pub fn trigger_key_from_hash_key(&self, hash_key: &str) -> Option<TriggerKey> {
        self.split_identity("trigger", hash_key)
            .map(|(group, name)| TriggerKey::new(name, group))
    }

    pub fn triggers_set_key(&self) -> String {
        self.key(&["triggers"])
    }

    pub fn trigger_group_set_key(&self, group: &str) -> String {
        self.key(&["trigger_group", group])
    }

    pub fn trigger_groups_set_key(&self) -> String {
        self.key(&["trigger_groups"])
    }

    pub fn paused_trigger_groups_set_key(&self) -> String {
        self.key(&["paused_trigger_groups"])
    }

    pub fn trigger_state_key(&self, state: TriggerState) -> String {
        self.key(&[state.set_name()])
    }

    // --- calendars -------------------------------------------------------

    pub fn calendar_hash_key(&self, name: &str) -> String {
        self.key(&["calendar", name])
    }

    pub fn calendars_set_key(&self) -> String {
        self.key(&["calendars"])
    }

    pub fn calendar_triggers_set_key(&self, name: &str) -> String {
        self.key(&["calendar_triggers", name])
    }

    // --- leases and locks ------------------------------------------------

    pub fn trigger_lock_key(&self, key: &TriggerKey) -> String {
        self.key(&["trigger_lock", &key.group, &key.name])
    }

    pub fn instance_lease_key(&self, instance_id: &str) -> String {
        self.key(&["instance", instance_id])
    }

    pub fn last_sweep_key(&self) -> String {
        self.key(&["last_triggers_release_time"])
    }

    pub fn lock_key(&self) -> String {
        self.key(&["lock"])
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new("triggerstore", ":")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_keys() {
        let schema = KeySchema::new("ts", ":");
        let job = JobKey::new("nightly", "reports");
        assert_eq!(schema.job_hash_key(&job), "ts:job:reports:nightly");
        assert_eq!(schema.job_data_key(&job), "ts:job_data:reports:nightly");
        assert_eq!(schema.job_triggers_set_key(&job), "ts:job_triggers:reports:nightly");
        assert_eq!(schema.job_group_set_key("reports"), "ts:job_group:reports");
    }

    #[test]
    fn test_trigger_round_trip_with_delimiter_in_name() {
        let schema = KeySchema::new("ts", ":");
        let key = TriggerKey::new("every:5m", "g");
        let hash_key = schema.trigger_hash_key(&key);
        assert_eq!(hash_key, "ts:trigger:g:every:5m");
        assert_eq!(schema.trigger_key_from_hash_key(&hash_key), Some(key));
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        let schema = KeySchema::new("ts", ":");
        assert_eq!(schema.trigger_key_from_hash_key("ts:job:g:n"), None);
        assert_eq!(schema.trigger_key_from_hash_key("other:trigger:g:n"), None);
        assert_eq!(schema.trigger_key_from_hash_key("ts:trigger:g"), None);
        assert_eq!(schema.job_key_from_hash_key("ts:job_data:g:n"), None);
    }

    #[test]
    fn test_is_valid_group() {
        let schema = KeySchema::new("ts", ":");
        assert!(schema.is_valid_group("reports"));
        assert!(!schema.is_valid_group("team:a"));
        assert!(!schema.is_valid_group(""));
    }

    #[test]
    fn test_state_keys_are_distinct() {
        let schema = KeySchema::default();
        let mut keys: Vec<String> = TriggerState::ALL
            .iter()
            .map(|s| schema.trigger_state_key(*s))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), TriggerState::ALL.len());
        assert_eq!(
            schema.trigger_state_key(TriggerState::Waiting),
            "triggerstore:waiting_triggers"
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let schema = KeySchema::new("q", "|");
        assert_eq!(schema.calendar_hash_key("holidays"), "q|calendar|holidays");
        assert_eq!(schema.lock_key(), "q|lock");
        assert_eq!(
            schema.job_key_from_hash_key("q|job|g|n"),
            Some(JobKey::new("n", "g"))
        );
    }
}
