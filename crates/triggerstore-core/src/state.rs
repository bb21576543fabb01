//! Trigger states and the per-state ordered index.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use triggerstore_kv::KvStore;

use crate::error::Result;
use crate::keys::TriggerKey;
use crate::schema::KeySchema;

/// Score of a trigger without a next fire time.
pub const NO_FIRE_TIME_SCORE: f64 = -1.0;

/// Internal trigger state; each maps to one ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerState {
    Waiting,
    Acquired,
    Blocked,
    Paused,
    PausedBlocked,
    Completed,
    Error,
}

impl TriggerState {
    pub const ALL: [TriggerState; 7] = [
        TriggerState::Waiting,
        TriggerState::Acquired,
        TriggerState::Blocked,
        TriggerState::Paused,
        TriggerState::PausedBlocked,
        TriggerState::Completed,
        TriggerState::Error,
    ];

    /// Name segment of the state's collection key.
    pub fn set_name(self) -> &'static str {
        match self {
            Self::Waiting => "waiting_triggers",
            Self::Acquired => "acquired_triggers",
            Self::Blocked => "blocked_triggers",
            Self::Paused => "paused_triggers",
            Self::PausedBlocked => "paused_blocked_triggers",
            Self::Completed => "completed_triggers",
            Self::Error => "error_triggers",
        }
    }

    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused | Self::PausedBlocked)
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Acquired => "acquired",
            Self::Blocked => "blocked",
            Self::Paused => "paused",
            Self::PausedBlocked => "paused_blocked",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Externally visible trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStatus {
    None,
    Normal,
    Paused,
    Blocked,
    Complete,
    Error,
}

impl From<Option<TriggerState>> for TriggerStatus {
    fn from(state: Option<TriggerState>) -> Self {
        match state {
            None => Self::None,
            Some(TriggerState::Waiting | TriggerState::Acquired) => Self::Normal,
            Some(TriggerState::Paused | TriggerState::PausedBlocked) => Self::Paused,
            Some(TriggerState::Blocked) => Self::Blocked,
            Some(TriggerState::Completed) => Self::Complete,
            Some(TriggerState::Error) => Self::Error,
        }
    }
}

/// Ordering score of a fire time.
pub fn score_of_time(at: Option<DateTime<Utc>>) -> f64 {
    at.map_or(NO_FIRE_TIME_SCORE, |t| t.timestamp_millis() as f64)
}

/// Seven ordered collections, one per [`TriggerState`], keyed by trigger.
///
/// A trigger is a member of at most one of them. `set_state` removes
/// before it adds, so an interrupted call leaves the trigger in no state
/// rather than two; the acquisition pass and the recovery sweep re-derive
/// it from the stored trigger.
#[derive(Clone)]
pub struct StateIndex {
    kv: Arc<dyn KvStore>,
    schema: KeySchema,
}

impl StateIndex {
    pub fn new(kv: Arc<dyn KvStore>, schema: KeySchema) -> Self {
        Self { kv, schema }
    }

    /// Move a trigger into `state` with `score`.
    pub async fn set_state(&self, key: &TriggerKey, state: TriggerState, score: f64) -> Result<()> {
        let member = self.schema.trigger_hash_key(key);
        for other in TriggerState::ALL {
            if other != state {
                self.kv
                    .sorted_remove(&self.schema.trigger_state_key(other), &member)
                    .await?;
            }
        }
        self.kv
            .sorted_add(&self.schema.trigger_state_key(state), &member, score)
            .await?;
        debug!("Trigger '{}' -> {}", key, state);
        Ok(())
    }

    /// Remove a trigger from every state. Returns whether it was in one.
    pub async fn clear_state(&self, key: &TriggerKey) -> Result<bool> {
        let member = self.schema.trigger_hash_key(key);
        let mut found = false;
        for state in TriggerState::ALL {
            found |= self
                .kv
                .sorted_remove(&self.schema.trigger_state_key(state), &member)
                .await?;
        }
        if found {
            debug!("Trigger '{}' state cleared", key);
        }
        Ok(found)
    }

    /// Up to `limit` triggers in `state` scored at or below
    /// `not_later_than`, earliest first.
    pub async fn query_due(
        &self,
        state: TriggerState,
        not_later_than: f64,
        limit: usize,
    ) -> Result<Vec<(TriggerKey, f64)>> {
        let members = self
            .kv
            .sorted_range_by_score(
                &self.schema.trigger_state_key(state),
                f64::NEG_INFINITY,
                not_later_than,
                Some(limit),
            )
            .await?;
        Ok(self.parse_members(members))
    }

    pub async fn score_of(&self, key: &TriggerKey, state: TriggerState) -> Result<Option<f64>> {
        let member = self.schema.trigger_hash_key(key);
        Ok(self
            .kv
            .sorted_score(&self.schema.trigger_state_key(state), &member)
            .await?)
    }

    pub async fn is_in(&self, key: &TriggerKey, state: TriggerState) -> Result<bool> {
        Ok(self.score_of(key, state).await?.is_some())
    }

    /// The state currently holding the trigger.
    pub async fn current_state(&self, key: &TriggerKey) -> Result<Option<TriggerState>> {
        Ok(self.current_entry(key).await?.map(|(state, _)| state))
    }

    /// The state currently holding the trigger, with the trigger's score.
    pub async fn current_entry(&self, key: &TriggerKey) -> Result<Option<(TriggerState, f64)>> {
        for state in TriggerState::ALL {
            if let Some(score) = self.score_of(key, state).await? {
                return Ok(Some((state, score)));
            }
        }
        Ok(None)
    }

    /// Every trigger in `state`, earliest first.
    pub async fn entries(&self, state: TriggerState) -> Result<Vec<(TriggerKey, f64)>> {
        let members = self
            .kv
            .sorted_members(&self.schema.trigger_state_key(state))
            .await?;
        Ok(self.parse_members(members))
    }

    fn parse_members(&self, members: Vec<triggerstore_kv::ScoredMember>) -> Vec<(TriggerKey, f64)> {
        members
            .into_iter()
            .filter_map(|m| match self.schema.trigger_key_from_hash_key(&m.member) {
                Some(key) => Some((key, m.score)),
                None => {
                    warn!("Skipping undecodable state member '{}'", m.member);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
