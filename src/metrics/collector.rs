// src/metrics/collector.rs
use crate::aggregator::CycleReport;
use crate::check::{CheckOutcome, CheckStatus};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::error;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Per-check metrics
    pub checks_total: IntCounterVec,
    pub check_duration_seconds: HistogramVec,
    pub unit_status: IntGaugeVec,

    // Cycle metrics
    pub cycles_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
    pub cycle_failures: IntGauge,

    // Registry
    pub registered_units: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks_total = IntCounterVec::new(
            Opts::new("secmon_checks_total", "Total check invocations"),
            &["unit", "status"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "secmon_check_duration_seconds",
                "Check invocation duration in seconds",
            ),
            &["unit"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let unit_status = IntGaugeVec::new(
            Opts::new(
                "secmon_unit_status",
                "Last check status (0=success, 1=failure, 2=timeout)",
            ),
            &["unit"],
        )?;
        registry.register(Box::new(unit_status.clone()))?;

        let cycles_total = IntCounter::new("secmon_cycles_total", "Total scheduler cycles")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "secmon_cycle_duration_seconds",
            "Scheduler cycle duration in seconds",
        ))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let cycle_failures = IntGauge::new(
            "secmon_cycle_failures",
            "Non-success outcomes in the most recent cycle",
        )?;
        registry.register(Box::new(cycle_failures.clone()))?;

        let registered_units =
            IntGauge::new("secmon_registered_units", "Number of registered check units")?;
        registry.register(Box::new(registered_units.clone()))?;

        Ok(Self {
            checks_total,
            check_duration_seconds,
            unit_status,
            cycles_total,
            cycle_duration_seconds,
            cycle_failures,
            registered_units,
        })
    }

    pub fn record_outcome(&self, outcome: &CheckOutcome) {
        let unit = outcome.unit_name.as_str();
        self.checks_total
            .with_label_values(&[unit, outcome.status.as_str()])
            .inc();

        self.check_duration_seconds
            .with_label_values(&[unit])
            .observe(outcome.duration.as_secs_f64());

        let value = match outcome.status {
            CheckStatus::Success => 0,
            CheckStatus::Failure => 1,
            CheckStatus::Timeout => 2,
        };
        self.unit_status.with_label_values(&[unit]).set(value);
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        for outcome in &report.outcomes {
            self.record_outcome(outcome);
        }
        self.cycles_total.inc();
        self.cycle_duration_seconds
            .observe(report.duration.as_secs_f64());
        self.cycle_failures.set(report.failure_count() as i64);
    }

    pub fn set_registered_units(&self, count: usize) {
        self.registered_units.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn outcome(name: &str, status: CheckStatus) -> CheckOutcome {
        CheckOutcome {
            unit_name: name.into(),
            status,
            detail: None,
            started_at: Utc::now(),
            duration: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_record_cycle() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.set_registered_units(2);
        metrics.record_cycle(&CycleReport {
            cycle_id: 1,
            timestamp: Utc::now(),
            duration: Duration::from_millis(50),
            outcomes: vec![
                outcome("keys", CheckStatus::Success),
                outcome("caldera", CheckStatus::Timeout),
            ],
        });

        assert_eq!(metrics.cycles_total.get(), 1);
        assert_eq!(metrics.cycle_failures.get(), 1);
        assert_eq!(metrics.registered_units.get(), 2);
        assert_eq!(
            metrics
                .checks_total
                .with_label_values(&["caldera", "timeout"])
                .get(),
            1
        );
        assert_eq!(metrics.unit_status.with_label_values(&["caldera"]).get(), 2);

        let text = String::from_utf8(registry.gather()).unwrap();
        assert!(text.contains("secmon_cycles_total 1"));
    }
}
