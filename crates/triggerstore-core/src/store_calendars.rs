//! Calendar operations.

use tracing::{info, warn};

use super::JobStore;
use crate::calendar::Calendar;
use crate::codec;
use crate::error::{JobStoreError, Result};

impl JobStore {
    /// Store a calendar. With `update_triggers`, every trigger using it has
    /// its next fire time recomputed against the new rules.
    pub async fn store_calendar(
        &self,
        name: &str,
        calendar: &Calendar,
        replace_existing: bool,
        update_triggers: bool,
    ) -> Result<()> {
        let hash_key = self.schema.calendar_hash_key(name);
        if !replace_existing && self.kv.exists(&hash_key).await? {
            return Err(JobStoreError::AlreadyExists {
                kind: "Calendar",
                key: name.to_string(),
            });
        }

        self.kv
            .hash_set(&hash_key, &codec::encode_calendar(name, calendar)?)
            .await?;
        self.kv
            .set_add(&self.schema.calendars_set_key(), name)
            .await?;
        info!("Stored calendar '{}'", name);

        if update_triggers {
            self.update_triggers_with_calendar(name, calendar).await?;
        }
        Ok(())
    }

    async fn update_triggers_with_calendar(&self, name: &str, calendar: &Calendar) -> Result<()> {
        let members = self
            .kv
            .set_members(&self.schema.calendar_triggers_set_key(name))
            .await?;
        let now = self.now();
        for member in members {
            let Some(key) = self.schema.trigger_key_from_hash_key(&member) else {
                warn!("Skipping undecodable calendar member '{}'", member);
                continue;
            };
            let Some(mut trigger) = self.load_trigger(&key).await? else {
                continue;
            };
            trigger.update_with_calendar(Some(calendar), now, self.misfire_threshold_ms())?;
            self.persist_trigger(&trigger).await?;

            match self.states.current_state(&key).await? {
                Some(state) if trigger.may_fire_again() => self.set_state(&trigger, state).await?,
                Some(_) => {
                    self.states.clear_state(&key).await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Remove a calendar. Fails while any trigger still references it.
    pub async fn remove_calendar(&self, name: &str) -> Result<bool> {
        let referencing = self
            .kv
            .set_len(&self.schema.calendar_triggers_set_key(name))
            .await?;
        if referencing > 0 {
            return Err(JobStoreError::Persistence(format!(
                "Calendar '{}' is still referenced by {} trigger(s)",
                name, referencing
            )));
        }

        let existed = self.kv.delete(&self.schema.calendar_hash_key(name)).await?;
        self.kv
            .set_remove(&self.schema.calendars_set_key(), name)
            .await?;
        if existed {
            info!("Removed calendar '{}'", name);
        }
        Ok(existed)
    }

    pub async fn retrieve_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        self.load_calendar(name).await
    }

    pub async fn check_calendar_exists(&self, name: &str) -> Result<bool> {
        Ok(self.kv.exists(&self.schema.calendar_hash_key(name)).await?)
    }

    pub async fn number_of_calendars(&self) -> Result<usize> {
        Ok(self.kv.set_len(&self.schema.calendars_set_key()).await?)
    }

    pub async fn get_calendar_names(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .set_members(&self.schema.calendars_set_key())
            .await?)
    }
}

#[cfg(test)]
#[path = "store_calendars_tests.rs"]
mod tests;
