// src/check/outcome.rs
use crate::error::ProbeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Failure,
    Timeout,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Failure => "failure",
            CheckStatus::Timeout => "timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckStatus::Success)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single check invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub unit_name: String,
    pub status: CheckStatus,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl CheckOutcome {
    pub fn from_result(
        unit_name: impl Into<String>,
        result: Result<Option<String>, ProbeError>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let (status, detail) = match result {
            Ok(detail) => (CheckStatus::Success, detail),
            Err(e @ ProbeError::TimedOut(_)) => (CheckStatus::Timeout, Some(e.to_string())),
            Err(e) => (CheckStatus::Failure, Some(e.to_string())),
        };

        Self {
            unit_name: unit_name.into(),
            status,
            detail,
            started_at,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Durations are exported as fractional milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Duration::try_from_secs_f64(ms.max(0.0) / 1_000.0).map_err(serde::de::Error::custom)
    }
}
