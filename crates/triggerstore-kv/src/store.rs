//! Store protocol trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::KvError;

/// A member of a score-ordered set together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Key-value store protocol.
///
/// Every call is an independent operation: there is no multi-key
/// transaction. Collections that become empty are removed, so `exists`
/// reports `false` for an emptied hash or set.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Check whether a key holds any value.
    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Delete a key of any kind. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    // --- hashes ----------------------------------------------------------

    /// Read every field of a hash. Missing key yields an empty list.
    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, KvError>;

    /// Read one field of a hash.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, KvError>;

    /// Upsert fields of a hash, leaving other fields untouched.
    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), KvError>;

    // --- sets ------------------------------------------------------------

    /// Add a member. Returns `false` when it was already present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Remove a member. Returns whether it was present.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Enumerate members in lexicographic order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError>;

    /// Membership test.
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Number of members.
    async fn set_len(&self, key: &str) -> Result<usize, KvError>;

    // --- score-ordered sets ----------------------------------------------

    /// Insert or re-score a member. Returns `true` when newly inserted.
    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<bool, KvError>;

    /// Remove a member. Returns whether it was present.
    async fn sorted_remove(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Score of a member, if present.
    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvError>;

    /// Members with `min <= score <= max`, ascending by score then member,
    /// truncated to `limit` entries when given.
    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredMember>, KvError>;

    /// Every member, ascending by score.
    async fn sorted_members(&self, key: &str) -> Result<Vec<ScoredMember>, KvError>;

    // --- strings ---------------------------------------------------------

    /// Read a string value.
    async fn string_get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a string value, replacing any previous value and TTL.
    async fn string_set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), KvError>;

    /// Write a string value only if the key is absent. Returns whether it was written.
    async fn string_set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError>;

    // --- named locks -----------------------------------------------------

    /// Take a named lock for `holder`. Re-taking by the same holder refreshes
    /// the TTL. Returns `false` when another holder owns it.
    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Release a named lock if `holder` owns it. Returns whether it was released.
    async fn lock_release(&self, key: &str, holder: &str) -> Result<bool, KvError>;
}
