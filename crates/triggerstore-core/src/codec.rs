//! Flat field-map encoding of jobs, triggers and calendars.
//!
//! Every optional field is written, as an empty string when unset, so an
//! upsert over an existing hash never leaves stale values behind.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::calendar::Calendar;
use crate::error::{JobStoreError, Result};
use crate::job::JobDetail;
use crate::keys::{JobKey, TriggerKey};
use crate::schedule::{CronSchedule, ScheduleCapability, SimpleSchedule, TriggerSchedule};
use crate::schema::KeySchema;
use crate::trigger::{MisfireInstruction, Trigger};

pub const JOB_TYPE: &str = "job_type";
pub const DESCRIPTION: &str = "description";
pub const DURABLE: &str = "durable";
pub const REQUESTS_RECOVERY: &str = "requests_recovery";
pub const CONCURRENT_EXECUTION_DISALLOWED: &str = "concurrent_execution_disallowed";
pub const PERSIST_JOB_DATA: &str = "persist_job_data_after_execution";

pub const JOB_HASH_KEY: &str = "job_hash_key";
pub const TRIGGER_TYPE: &str = "trigger_type";
pub const NEXT_FIRE_TIME: &str = "next_fire_time";
pub const PREV_FIRE_TIME: &str = "prev_fire_time";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const PRIORITY: &str = "priority";
pub const MISFIRE_INSTRUCTION: &str = "misfire_instruction";
pub const CALENDAR_NAME: &str = "calendar_name";
pub const FIRE_INSTANCE_ID: &str = "fire_instance_id";
pub const REPEAT_COUNT: &str = "repeat_count";
pub const REPEAT_INTERVAL: &str = "repeat_interval";
pub const TIMES_TRIGGERED: &str = "times_triggered";
pub const CRON_EXPRESSION: &str = "cron_expression";
pub const TIME_ZONE_ID: &str = "time_zone_id";

pub const CALENDAR_SERIALIZED: &str = "calendar_serialized";

type Fields = Vec<(String, String)>;

fn field(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn opt_field(name: &str, value: Option<&str>) -> (String, String) {
    field(name, value.unwrap_or_default())
}

fn time_field(name: &str, value: Option<DateTime<Utc>>) -> (String, String) {
    field(name, encode_time(value))
}

/// Epoch milliseconds, or an empty string for "none".
pub fn encode_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.timestamp_millis().to_string())
        .unwrap_or_default()
}

pub fn millis_to_time(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Read access to a decoded hash with errors tied to its key.
struct FieldMap<'a> {
    key: &'a str,
    map: HashMap<&'a str, &'a str>,
}

impl<'a> FieldMap<'a> {
    fn new(key: &'a str, fields: &'a [(String, String)]) -> Self {
        Self {
            key,
            map: fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        }
    }

    fn required(&self, name: &str) -> Result<&'a str> {
        self.map
            .get(name)
            .copied()
            .ok_or_else(|| JobStoreError::codec(self.key, format!("missing field {}", name)))
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.map
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<T> {
        let raw = self.required(name)?;
        raw.parse()
            .map_err(|_| JobStoreError::codec(self.key, format!("bad {}: '{}'", name, raw)))
    }

    fn flag(&self, name: &str) -> Result<bool> {
        match self.map.get(name).copied() {
            None | Some("") => Ok(false),
            Some(_) => self.parse(name),
        }
    }

    fn time(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.map.get(name).copied() {
            None | Some("") => Ok(None),
            Some(raw) => {
                let millis: i64 = raw.parse().map_err(|_| {
                    JobStoreError::codec(self.key, format!("bad {}: '{}'", name, raw))
                })?;
                millis_to_time(millis)
                    .map(Some)
                    .ok_or_else(|| JobStoreError::codec(self.key, format!("{} out of range", name)))
            }
        }
    }
}

// --- jobs ----------------------------------------------------------------

pub fn encode_job(job: &JobDetail) -> Fields {
    vec![
        field(JOB_TYPE, &job.job_type),
        opt_field(DESCRIPTION, job.description.as_deref()),
        field(DURABLE, job.durable),
        field(REQUESTS_RECOVERY, job.requests_recovery),
        field(CONCURRENT_EXECUTION_DISALLOWED, job.concurrent_execution_disallowed),
        field(PERSIST_JOB_DATA, job.persist_job_data_after_execution),
    ]
}

pub fn encode_job_data(job: &JobDetail) -> Fields {
    job.job_data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn decode_job(
    key: JobKey,
    hash_key: &str,
    fields: &[(String, String)],
    data: Vec<(String, String)>,
) -> Result<JobDetail> {
    let map = FieldMap::new(hash_key, fields);
    Ok(JobDetail {
        key,
        job_type: map.required(JOB_TYPE)?.to_string(),
        description: map.optional(DESCRIPTION),
        durable: map.flag(DURABLE)?,
        requests_recovery: map.flag(REQUESTS_RECOVERY)?,
        concurrent_execution_disallowed: map.flag(CONCURRENT_EXECUTION_DISALLOWED)?,
        persist_job_data_after_execution: map.flag(PERSIST_JOB_DATA)?,
        job_data: data.into_iter().collect(),
    })
}

// --- triggers ------------------------------------------------------------

pub fn encode_trigger(schema: &KeySchema, trigger: &Trigger) -> Fields {
    let mut fields = vec![
        field(JOB_HASH_KEY, schema.job_hash_key(&trigger.job_key)),
        opt_field(DESCRIPTION, trigger.description.as_deref()),
        field(TRIGGER_TYPE, trigger.schedule.type_name()),
        time_field(NEXT_FIRE_TIME, trigger.next_fire_time),
        time_field(PREV_FIRE_TIME, trigger.previous_fire_time),
        time_field(START_TIME, Some(trigger.start_time)),
        time_field(END_TIME, trigger.end_time),
        field(PRIORITY, trigger.priority),
        field(MISFIRE_INSTRUCTION, trigger.misfire_instruction.code()),
        opt_field(CALENDAR_NAME, trigger.calendar_name.as_deref()),
        opt_field(FIRE_INSTANCE_ID, trigger.fire_instance_id.as_deref()),
    ];
    match &trigger.schedule {
        TriggerSchedule::Simple(s) => {
            fields.push(field(REPEAT_COUNT, s.repeat_count));
            fields.push(field(REPEAT_INTERVAL, s.repeat_interval_ms));
            fields.push(field(TIMES_TRIGGERED, s.times_triggered));
        }
        TriggerSchedule::Cron(c) => {
            fields.push(field(CRON_EXPRESSION, &c.expression));
            fields.push(field(TIME_ZONE_ID, &c.time_zone));
        }
    }
    fields
}

pub fn decode_trigger(
    schema: &KeySchema,
    key: TriggerKey,
    hash_key: &str,
    fields: &[(String, String)],
) -> Result<Trigger> {
    let map = FieldMap::new(hash_key, fields);

    let job_hash_key = map.required(JOB_HASH_KEY)?;
    let job_key = schema.job_key_from_hash_key(job_hash_key).ok_or_else(|| {
        JobStoreError::codec(hash_key, format!("bad job reference '{}'", job_hash_key))
    })?;

    let schedule = match map.required(TRIGGER_TYPE)? {
        "SIMPLE" => TriggerSchedule::Simple(SimpleSchedule {
            repeat_count: map.parse(REPEAT_COUNT)?,
            repeat_interval_ms: map.parse(REPEAT_INTERVAL)?,
            times_triggered: map.parse(TIMES_TRIGGERED)?,
        }),
        "CRON" => TriggerSchedule::Cron(CronSchedule {
            expression: map.required(CRON_EXPRESSION)?.to_string(),
            time_zone: map.optional(TIME_ZONE_ID).unwrap_or_else(|| "UTC".to_string()),
        }),
        other => return Err(JobStoreError::UnsupportedTriggerType(other.to_string())),
    };

    let code: i32 = map.parse(MISFIRE_INSTRUCTION)?;
    let misfire_instruction = MisfireInstruction::from_code(code).ok_or_else(|| {
        JobStoreError::codec(hash_key, format!("unknown misfire instruction {}", code))
    })?;
    let start_time = map
        .time(START_TIME)?
        .ok_or_else(|| JobStoreError::codec(hash_key, "missing start time"))?;

    Ok(Trigger {
        key,
        job_key,
        description: map.optional(DESCRIPTION),
        schedule,
        start_time,
        end_time: map.time(END_TIME)?,
        next_fire_time: map.time(NEXT_FIRE_TIME)?,
        previous_fire_time: map.time(PREV_FIRE_TIME)?,
        priority: map.parse(PRIORITY)?,
        misfire_instruction,
        calendar_name: map.optional(CALENDAR_NAME),
        fire_instance_id: map.optional(FIRE_INSTANCE_ID),
    })
}

// --- calendars -----------------------------------------------------------

pub fn encode_calendar(name: &str, calendar: &Calendar) -> Result<Fields> {
    let json = calendar
        .to_json()
        .map_err(|e| JobStoreError::codec(name, e.to_string()))?;
    Ok(vec![field(CALENDAR_SERIALIZED, json)])
}

pub fn decode_calendar(hash_key: &str, fields: &[(String, String)]) -> Result<Calendar> {
    let map = FieldMap::new(hash_key, fields);
    Calendar::from_json(map.required(CALENDAR_SERIALIZED)?)
        .map_err(|e| JobStoreError::codec(hash_key, e.to_string()))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
