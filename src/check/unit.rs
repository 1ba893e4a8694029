// src/check/unit.rs
use super::outcome::CheckOutcome;
use super::probe::Probe;
use crate::config::RetryConfig;
use crate::error::{MonitorError, ProbeError};
use crate::retry::RetryStrategy;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// One registered probe together with its deadline and retry policy.
#[derive(Clone)]
pub struct CheckUnit {
    name: String,
    probe: Arc<dyn Probe>,
    timeout: Duration,
    retry: RetryStrategy,
}

impl fmt::Debug for CheckUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckUnit")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.retry.max_attempts())
            .finish()
    }
}

impl CheckUnit {
    pub fn new(
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MonitorError::config("check unit name must not be empty"));
        }
        if timeout.is_zero() {
            return Err(MonitorError::config(format!(
                "check unit '{}' needs a positive timeout",
                name
            )));
        }

        Ok(Self {
            name,
            probe,
            timeout,
            retry: RetryStrategy::default(),
        })
    }

    /// Retry failed attempts with backoff. All attempts share the unit timeout.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryStrategy::new(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the probe once (plus retries) under the unit timeout.
    ///
    /// The probe runs in its own task, so a panic is caught as a failure. On
    /// timeout the task is aborted and the outcome is returned immediately;
    /// work the probe pushed onto other threads may still be running.
    pub async fn invoke(&self) -> CheckOutcome {
        let started_at = Utc::now();
        let start = Instant::now();

        let probe = self.probe.clone();
        let retry = self.retry.clone();
        let mut handle = tokio::spawn(async move {
            retry.execute(|| probe.check()).await
        });

        let result = match timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(detail))) => Ok(detail),
            Ok(Ok(Err(e))) => Err(ProbeError::Failed(format!("{:#}", e))),
            Ok(Err(join_err)) if join_err.is_panic() => Err(ProbeError::Panicked),
            Ok(Err(_)) => Err(ProbeError::Cancelled),
            Err(_) => {
                handle.abort();
                Err(ProbeError::TimedOut(self.timeout))
            }
        };

        let duration = start.elapsed();
        match &result {
            Ok(_) => debug!("Check {} passed in {:?}", self.name, duration),
            Err(e) => warn!("Check {} did not pass: {}", self.name, e),
        }

        CheckOutcome::from_result(self.name.clone(), result, started_at, duration)
    }
}
