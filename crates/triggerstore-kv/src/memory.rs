//! In-memory key-value store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::error::KvError;
use crate::store::{KvStore, ScoredMember};

/// Total order over scores so they can key a `BTreeSet`.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) -> bool {
        let fresh = match self.scores.insert(member.to_string(), score) {
            Some(old) => {
                self.order.remove(&(Score(old), member.to_string()));
                false
            }
            None => true,
        };
        self.order.insert((Score(score), member.to_string()));
        fresh
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order.remove(&(Score(old), member.to_string()));
                true
            }
            None => false,
        }
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug)]
enum Value {
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    Sorted(SortedSet),
    Str(String),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Sorted(z) => z.is_empty(),
            Value::Str(_) => false,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
}

impl Inner {
    fn live(&mut self, key: &str, now: i64) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            trace!(key, "expired");
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    /// Drop the key when its collection became empty.
    fn prune(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(|e| e.value.is_empty()) {
            self.entries.remove(key);
        }
    }

    fn hash(&mut self, key: &str, now: i64) -> Result<Option<&mut BTreeMap<String, String>>, KvError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry { value: Value::Hash(h), .. }) => Ok(Some(h)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hash_entry(&mut self, key: &str, now: i64) -> Result<&mut BTreeMap<String, String>, KvError> {
        if self.hash(key, now)?.is_none() {
            self.entries
                .insert(key.to_string(), Entry::new(Value::Hash(BTreeMap::new())));
        }
        self.hash(key, now)?.ok_or_else(|| wrong_type(key))
    }

    fn set(&mut self, key: &str, now: i64) -> Result<Option<&mut BTreeSet<String>>, KvError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry { value: Value::Set(s), .. }) => Ok(Some(s)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set_entry(&mut self, key: &str, now: i64) -> Result<&mut BTreeSet<String>, KvError> {
        if self.set(key, now)?.is_none() {
            self.entries
                .insert(key.to_string(), Entry::new(Value::Set(BTreeSet::new())));
        }
        self.set(key, now)?.ok_or_else(|| wrong_type(key))
    }

    fn sorted(&mut self, key: &str, now: i64) -> Result<Option<&mut SortedSet>, KvError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry { value: Value::Sorted(z), .. }) => Ok(Some(z)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn sorted_entry(&mut self, key: &str, now: i64) -> Result<&mut SortedSet, KvError> {
        if self.sorted(key, now)?.is_none() {
            self.entries
                .insert(key.to_string(), Entry::new(Value::Sorted(SortedSet::default())));
        }
        self.sorted(key, now)?.ok_or_else(|| wrong_type(key))
    }

    fn string(&mut self, key: &str, now: i64) -> Result<Option<&String>, KvError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn put_string(&mut self, key: &str, value: &str, ttl: Option<Duration>, now: i64) {
        let expires_at = ttl.map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now.saturating_add(ttl_ms)
        });
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
    }
}

fn wrong_type(key: &str) -> KvError {
    KvError::WrongType {
        key: key.to_string(),
    }
}

/// In-memory store with Redis-like semantics.
///
/// Expiry is evaluated lazily against the injected [`Clock`], so a
/// [`ManualClock`](crate::ManualClock) makes TTL behaviour deterministic.
/// Cloning shares the underlying data, which lets several job store
/// instances run against one store.
#[derive(Clone)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl MemoryKvStore {
    /// Create an empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let now = self.clock.now_millis();
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Live keys in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        Ok(self.inner.lock().live(key, now).is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let existed = inner.live(key, now).is_some();
        inner.entries.remove(key);
        Ok(existed)
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner
            .hash(key, now)?
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.hash(key, now)?.and_then(|h| h.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), KvError> {
        if fields.is_empty() {
            return Ok(());
        }
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let hash = inner.hash_entry(key, now)?;
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.set_entry(key, now)?.insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let removed = match inner.set(key, now)? {
            Some(set) => set.remove(member),
            None => false,
        };
        inner.prune(key);
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner
            .set(key, now)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.set(key, now)?.is_some_and(|s| s.contains(member)))
    }

    async fn set_len(&self, key: &str) -> Result<usize, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.set(key, now)?.map_or(0, |s| s.len()))
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.sorted_entry(key, now)?.insert(member, score))
    }

    async fn sorted_remove(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let removed = match inner.sorted(key, now)? {
            Some(z) => z.remove(member),
            None => false,
        };
        inner.prune(key);
        Ok(removed)
    }

    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner
            .sorted(key, now)?
            .and_then(|z| z.scores.get(member).copied()))
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredMember>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let Some(z) = inner.sorted(key, now)? else {
            return Ok(Vec::new());
        };
        let in_range = z
            .order
            .iter()
            .skip_while(|(score, _)| score.0 < min)
            .take_while(|(score, _)| score.0 <= max)
            .map(|(score, member)| ScoredMember::new(member.clone(), score.0));
        Ok(match limit {
            Some(limit) => in_range.take(limit).collect(),
            None => in_range.collect(),
        })
    }

    async fn sorted_members(&self, key: &str) -> Result<Vec<ScoredMember>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner
            .sorted(key, now)?
            .map(|z| {
                z.order
                    .iter()
                    .map(|(score, member)| ScoredMember::new(member.clone(), score.0))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        Ok(inner.string(key, now)?.cloned())
    }

    async fn string_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        inner.put_string(key, value, ttl, now);
        Ok(())
    }

    async fn string_set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        if inner.live(key, now).is_some() {
            return Ok(false);
        }
        inner.put_string(key, value, ttl, now);
        Ok(true)
    }

    async fn lock_take(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let current = inner.string(key, now)?.cloned();
        match current {
            Some(current) if current != holder => Ok(false),
            _ => {
                inner.put_string(key, holder, Some(ttl), now);
                Ok(true)
            }
        }
    }

    async fn lock_release(&self, key: &str, holder: &str) -> Result<bool, KvError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let current = inner.string(key, now)?.cloned();
        match current {
            Some(current) if current == holder => {
                inner.entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
