// src/service/monitor.rs
use crate::aggregator::{CycleReport, ResultAggregator};
use crate::check::{build_probe, CheckUnit};
use crate::config::Config;
use crate::error::{MonitorError, Result};
use crate::metrics::MetricsCollector;
use crate::scheduler::Scheduler;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

enum Phase {
    Idle,
    Running(JoinHandle<Result<()>>),
    // stop() is waiting for the loop to finish its in-flight tick
    Stopping,
    Stopped,
}

struct ServiceState {
    scheduler: Arc<Scheduler>,
    phase: Phase,
}

/// Owns the scheduler and its aggregator and drives the start/stop
/// lifecycle.
pub struct MonitorService {
    id: Uuid,
    aggregator: Arc<ResultAggregator>,
    state: Mutex<ServiceState>,
}

impl MonitorService {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregator: scheduler.aggregator(),
            state: Mutex::new(ServiceState {
                scheduler: Arc::new(scheduler),
                phase: Phase::Idle,
            }),
        }
    }

    /// Build the aggregator, scheduler and every configured check.
    pub fn from_config(config: &Config, metrics: Option<Arc<MetricsCollector>>) -> Result<Self> {
        config.validate()?;

        let aggregator = Arc::new(ResultAggregator::with_sink_buffer(
            config.history_size,
            config.sink_buffer,
        ));

        let mut scheduler = Scheduler::new(aggregator);
        if let Some(metrics) = metrics {
            scheduler = scheduler.with_metrics(metrics);
        }
        if let Some(limit) = config.max_concurrency {
            scheduler = scheduler.with_max_concurrency(limit)?;
        }

        let client = Client::builder()
            .build()
            .map_err(|e| MonitorError::config(format!("failed to build HTTP client: {}", e)))?;

        for check in &config.checks {
            let unit = CheckUnit::new(
                check.name.clone(),
                build_probe(&check.probe, &client),
                check.timeout(),
            )?
            .with_retry(check.retry.clone());
            scheduler.register(unit)?;
        }

        Ok(Self::new(scheduler))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        self.aggregator.clone()
    }

    /// Add a check before the service is first started.
    pub async fn register(&self, unit: CheckUnit) -> Result<()> {
        let mut state = self.state.lock().await;
        if !matches!(state.phase, Phase::Idle) {
            return Err(MonitorError::AlreadyRunning);
        }
        // Idle means no loop has ever been spawned, so the Arc is unshared.
        Arc::get_mut(&mut state.scheduler)
            .ok_or_else(|| MonitorError::Internal("scheduler registry is shared".into()))?
            .register(unit)
    }

    /// Spawn the scheduler loop. A stopped service can be started again;
    /// cycle ids keep counting up.
    pub async fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(MonitorError::config("interval must be greater than zero"));
        }

        let mut state = self.state.lock().await;
        match state.phase {
            Phase::Running(_) | Phase::Stopping => return Err(MonitorError::AlreadyRunning),
            Phase::Stopped => state.scheduler.resume(),
            Phase::Idle => {}
        }

        let runner = state.scheduler.clone();
        let span = info_span!("monitor", id = %self.id);
        let handle = tokio::spawn(
            async move {
                let result = runner.run_forever(interval).await;
                if let Err(e) = &result {
                    error!("Scheduler terminated: {}", e);
                }
                result
            }
            .instrument(span),
        );

        info!(
            "Monitor {} started with {} checks every {:?}",
            self.id,
            state.scheduler.len(),
            interval
        );
        state.phase = Phase::Running(handle);
        Ok(())
    }

    /// Request shutdown and wait for the in-flight cycle to finish. Until
    /// the loop has exited, `start` is refused with `AlreadyRunning`.
    pub async fn stop(&self) -> Result<()> {
        let (scheduler, handle) = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut state.phase, Phase::Stopping) {
                Phase::Running(handle) => (state.scheduler.clone(), handle),
                other => {
                    state.phase = other;
                    return Err(MonitorError::NotRunning);
                }
            }
        };

        info!("Stopping monitor {}", self.id);
        scheduler.stop();

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(MonitorError::Internal(format!("scheduler task failed: {}", e))),
        };

        self.state.lock().await.phase = Phase::Stopped;
        result
    }

    /// The most recent cycle report, or `None` before the first cycle ends.
    pub async fn status(&self) -> Result<Option<Arc<CycleReport>>> {
        match self.state.lock().await.phase {
            Phase::Idle => Err(MonitorError::NotRunning),
            _ => Ok(self.aggregator.latest()),
        }
    }

    pub async fn is_running(&self) -> bool {
        match &self.state.lock().await.phase {
            Phase::Running(handle) => !handle.is_finished(),
            _ => false,
        }
    }
}
