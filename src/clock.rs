use chrono::{Duration, Local, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Format shared by every persisted timestamp and every published file name.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Error)]
#[error("failed to parse timestamp '{value}' (expected YYYY-MM-DD-HH-MM-SS): {source}")]
pub struct TimestampError {
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TimestampError> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|source| {
        TimestampError {
            value: value.to_string(),
            source,
        }
    })
}

/// Source of "now" for every component of a run.
pub trait Clock: Send + Sync {
    /// Current wall-clock time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;

    fn timestamp(&self) -> String {
        format_timestamp(self.now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    kind: ClockKind,
}

impl SystemClock {
    pub fn new(kind: ClockKind) -> Self {
        Self { kind }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = match self.kind {
            ClockKind::Local => Local::now().naive_local(),
            ClockKind::Utc => Utc::now().naive_utc(),
        };
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn at(value: &str) -> Result<Self, TimestampError> {
        Ok(Self::new(parse_timestamp(value)?))
    }

    pub fn set(&self, value: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
