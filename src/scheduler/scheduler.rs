// src/scheduler/scheduler.rs
use crate::aggregator::{CycleReport, ResultAggregator};
use crate::check::{CheckOutcome, CheckUnit};
use crate::error::{MonitorError, ProbeError, Result};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Runs every registered check once per tick.
///
/// Units are registered through `&mut self` before the loop starts; once
/// the scheduler is shared behind an `Arc` the registry is frozen.
pub struct Scheduler {
    units: Vec<Arc<CheckUnit>>,
    names: HashSet<String>,
    aggregator: Arc<ResultAggregator>,
    metrics: Option<Arc<MetricsCollector>>,
    max_concurrency: Option<usize>,
    next_cycle_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(aggregator: Arc<ResultAggregator>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            units: Vec::new(),
            names: HashSet::new(),
            aggregator,
            metrics: None,
            max_concurrency: None,
            next_cycle_id: AtomicU64::new(1),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cap the number of probes in flight at once. Without a cap every unit
    /// gets its own slot.
    pub fn with_max_concurrency(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(MonitorError::config("max_concurrency must be greater than zero"));
        }
        self.max_concurrency = Some(limit);
        Ok(self)
    }

    pub fn register(&mut self, unit: CheckUnit) -> Result<()> {
        if self.names.contains(unit.name()) {
            return Err(MonitorError::DuplicateName(unit.name().to_string()));
        }

        debug!("Registered check {} (timeout {:?})", unit.name(), unit.timeout());
        self.names.insert(unit.name().to_string());
        self.units.push(Arc::new(unit));

        if let Some(metrics) = &self.metrics {
            metrics.set_registered_units(self.units.len());
        }
        Ok(())
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        self.aggregator.clone()
    }

    /// Ask the loop to exit once the in-flight tick (if any) has finished.
    ///
    /// The request sticks: a later `run_forever` returns `Ok(())` straight
    /// away until `resume` clears it. This way a stop issued before the loop
    /// task gets polled is not lost.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Tick every `interval`, measured from the start of each tick. A tick
    /// that overruns is followed immediately by the next one.
    pub async fn run_forever(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(MonitorError::config("interval must be greater than zero"));
        }
        if self.units.is_empty() {
            warn!("Scheduler started with no registered checks");
        }

        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting security scheduler: {} checks every {:?}",
            self.units.len(),
            interval
        );

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let tick_start = Instant::now();
            self.run_cycle().await?;

            if Self::wait_for_next_tick(&mut shutdown_rx, tick_start + interval).await {
                break;
            }
        }

        info!("Security scheduler stopped");
        Ok(())
    }

    /// Sleep until `deadline`. Returns true if a stop was requested first.
    async fn wait_for_next_tick(shutdown_rx: &mut watch::Receiver<bool>, deadline: Instant) -> bool {
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return false,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        sleep_until(deadline).await;
                        return false;
                    }
                    if *shutdown_rx.borrow_and_update() {
                        return true;
                    }
                }
            }
        }
    }

    /// Clear a previous stop request so the loop can be started again. Only
    /// call this once the previous `run_forever` has returned.
    pub fn resume(&self) {
        let _ = self.shutdown_tx.send(false);
    }

    /// Run every unit once and record the report.
    pub async fn run_cycle(&self) -> Result<Arc<CycleReport>> {
        let cycle_id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now();
        let start = Instant::now();

        debug!(cycle_id, "Starting cycle with {} checks", self.units.len());

        let permits = Arc::new(Semaphore::new(
            self.max_concurrency.unwrap_or(self.units.len()).max(1),
        ));

        let mut tasks = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let unit = unit.clone();
            let permits = permits.clone();
            tasks.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                unit.invoke().await
            }));
        }

        // join_all keeps registration order regardless of completion order
        let results = futures::future::join_all(tasks).await;

        let outcomes: Vec<CheckOutcome> = results
            .into_iter()
            .zip(&self.units)
            .map(|(result, unit)| match result {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let error = if join_err.is_panic() {
                        ProbeError::Panicked
                    } else {
                        ProbeError::Cancelled
                    };
                    CheckOutcome::from_result(unit.name(), Err(error), timestamp, start.elapsed())
                }
            })
            .collect();

        if outcomes.len() != self.units.len() {
            return Err(MonitorError::Internal(format!(
                "cycle {} produced {} outcomes for {} registered checks",
                cycle_id,
                outcomes.len(),
                self.units.len()
            )));
        }

        let report = CycleReport {
            cycle_id,
            timestamp,
            duration: start.elapsed(),
            outcomes,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(&report);
        }

        info!(
            cycle_id,
            "Cycle complete: {}/{} checks passed in {:?}",
            report.outcomes.len() - report.failure_count(),
            report.outcomes.len(),
            report.duration
        );

        Ok(self.aggregator.record(report).await)
    }
}
