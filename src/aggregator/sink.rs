// src/aggregator/sink.rs
use super::report::CycleReport;
use crate::check::CheckStatus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Subscriber for finished cycle reports. Delivery is best-effort.
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn on_report(&self, report: Arc<CycleReport>);
}

/// Writes a one-line summary per cycle, plus one line per non-passing check.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_report(&self, report: Arc<CycleReport>) {
        info!(
            cycle_id = report.cycle_id,
            "Security cycle complete: {} passed, {} failed, {} timed out ({:?})",
            report.count(CheckStatus::Success),
            report.count(CheckStatus::Failure),
            report.count(CheckStatus::Timeout),
            report.duration,
        );

        for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
            warn!(
                cycle_id = report.cycle_id,
                unit = %outcome.unit_name,
                status = %outcome.status,
                "{}",
                outcome.detail.as_deref().unwrap_or("no detail")
            );
        }
    }
}

/// Appends each report as one JSON document per line.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open report file {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    async fn write(&self, report: &CycleReport) -> Result<()> {
        let mut line = serde_json::to_vec(report)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn on_report(&self, report: Arc<CycleReport>) {
        if let Err(e) = self.write(&report).await {
            error!(
                "Failed to export cycle {} to {}: {:#}",
                report.cycle_id,
                self.path.display(),
                e
            );
        }
    }
}
