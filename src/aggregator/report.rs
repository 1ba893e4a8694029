// src/aggregator/report.rs
use crate::check::{duration_ms, CheckOutcome, CheckStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything one scheduler tick produced, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub outcomes: Vec<CheckOutcome>,
}

impl CycleReport {
    /// Number of outcomes that are not `Success`.
    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_healthy(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn outcome(&self, unit_name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.unit_name == unit_name)
    }
}
