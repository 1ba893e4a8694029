// src/aggregator/aggregator.rs
use super::report::CycleReport;
use super::sink::ReportSink;
use crate::check::{CheckOutcome, CheckStatus};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Running totals for one check unit across every recorded cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub consecutive_non_success: u64,
    pub last_status: Option<CheckStatus>,
}

impl UnitSummary {
    fn observe(&mut self, outcome: &CheckOutcome) {
        self.total += 1;
        match outcome.status {
            CheckStatus::Success => self.successes += 1,
            CheckStatus::Failure => self.failures += 1,
            CheckStatus::Timeout => self.timeouts += 1,
        }
        if outcome.is_success() {
            self.consecutive_non_success = 0;
        } else {
            self.consecutive_non_success += 1;
        }
        self.last_status = Some(outcome.status);
    }
}

/// Bounded history of cycle reports plus fan-out to subscribers.
///
/// Only the scheduler writes. `latest()` is a lock-free snapshot; `history()`
/// copies the buffer under a read lock.
pub struct ResultAggregator {
    capacity: usize,
    history: RwLock<VecDeque<Arc<CycleReport>>>,
    latest: ArcSwapOption<CycleReport>,
    units: DashMap<String, UnitSummary>,
    reports_tx: broadcast::Sender<Arc<CycleReport>>,
}

impl ResultAggregator {
    pub fn new(capacity: usize) -> Self {
        Self::with_sink_buffer(capacity, 32)
    }

    /// `sink_buffer` is how many reports a slow subscriber may fall behind
    /// before its oldest pending reports are dropped.
    pub fn with_sink_buffer(capacity: usize, sink_buffer: usize) -> Self {
        let capacity = capacity.max(1);
        let (reports_tx, _) = broadcast::channel(sink_buffer.max(1));

        Self {
            capacity,
            history: RwLock::new(VecDeque::with_capacity(capacity)),
            latest: ArcSwapOption::empty(),
            units: DashMap::new(),
            reports_tx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn record(&self, report: CycleReport) -> Arc<CycleReport> {
        let report = Arc::new(report);

        for outcome in &report.outcomes {
            self.units
                .entry(outcome.unit_name.clone())
                .or_default()
                .observe(outcome);
        }

        {
            let mut history = self.history.write().await;
            while history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(report.clone());
            // Published before the write lock drops so history() never runs ahead of latest().
            self.latest.store(Some(report.clone()));
        }

        // send only fails when nobody is subscribed
        if self.reports_tx.send(report.clone()).is_err() {
            debug!("No report subscribers");
        }
        report
    }

    pub fn latest(&self) -> Option<Arc<CycleReport>> {
        self.latest.load_full()
    }

    /// Oldest first, most recent last.
    pub async fn history(&self) -> Vec<Arc<CycleReport>> {
        self.history.read().await.iter().cloned().collect()
    }

    pub fn latest_failure_count(&self) -> usize {
        self.latest().map(|r| r.failure_count()).unwrap_or(0)
    }

    pub fn unit_summary(&self, unit_name: &str) -> Option<UnitSummary> {
        self.units.get(unit_name).map(|s| s.value().clone())
    }

    /// Raw report stream. A receiver that falls more than `sink_buffer`
    /// reports behind loses the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CycleReport>> {
        self.reports_tx.subscribe()
    }

    /// Drive `sink` from its own task so a slow sink never holds up the
    /// scheduler. The task ends when the aggregator is dropped.
    pub fn add_sink(&self, sink: Arc<dyn ReportSink>) -> JoinHandle<()> {
        let mut rx = self.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(report) => sink.on_report(report).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Report sink {} fell behind, dropped {} reports", sink.name(), skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn outcome(name: &str, status: CheckStatus) -> CheckOutcome {
        CheckOutcome {
            unit_name: name.to_string(),
            status,
            detail: None,
            started_at: Utc::now(),
            duration: Duration::from_millis(5),
        }
    }

    fn report(cycle_id: u64, statuses: &[(&str, CheckStatus)]) -> CycleReport {
        CycleReport {
            cycle_id,
            timestamp: Utc::now(),
            duration: Duration::from_millis(10),
            outcomes: statuses.iter().map(|(n, s)| outcome(n, *s)).collect(),
        }
    }

    #[tokio::test]
    async fn test_empty_aggregator() {
        let aggregator = ResultAggregator::new(3);
        assert!(aggregator.latest().is_none());
        assert!(aggregator.history().await.is_empty());
        assert_eq!(aggregator.latest_failure_count(), 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded_fifo() {
        let aggregator = ResultAggregator::new(3);
        for id in 1..=5 {
            aggregator.record(report(id, &[("a", CheckStatus::Success)])).await;
            assert!(aggregator.history().await.len() <= 3);
        }

        let ids: Vec<u64> = aggregator.history().await.iter().map(|r| r.cycle_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(aggregator.latest().unwrap().cycle_id, 5);
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_one() {
        let aggregator = ResultAggregator::new(0);
        aggregator.record(report(1, &[])).await;
        aggregator.record(report(2, &[])).await;
        assert_eq!(aggregator.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unit_summaries() {
        let aggregator = ResultAggregator::new(10);
        aggregator
            .record(report(1, &[("a", CheckStatus::Success), ("b", CheckStatus::Failure)]))
            .await;
        aggregator
            .record(report(2, &[("a", CheckStatus::Timeout), ("b", CheckStatus::Failure)]))
            .await;

        assert_eq!(aggregator.latest_failure_count(), 2);

        let a = aggregator.unit_summary("a").unwrap();
        assert_eq!((a.total, a.successes, a.timeouts), (2, 1, 1));
        assert_eq!(a.consecutive_non_success, 1);
        assert_eq!(a.last_status, Some(CheckStatus::Timeout));

        let b = aggregator.unit_summary("b").unwrap();
        assert_eq!(b.failures, 2);
        assert_eq!(b.consecutive_non_success, 2);

        assert!(aggregator.unit_summary("missing").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_latest_never_behind_history() {
        let aggregator = Arc::new(ResultAggregator::new(4));

        let reader = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    let history = aggregator.history().await;
                    let latest = aggregator.latest();
                    if let Some(last) = history.last() {
                        assert!(latest.unwrap().cycle_id >= last.cycle_id);
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for id in 1..=2_000 {
            aggregator.record(report(id, &[("a", CheckStatus::Success)])).await;
        }
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribers_receive_reports() {
        let aggregator = ResultAggregator::new(10);
        let mut rx = aggregator.subscribe();

        aggregator.record(report(1, &[("a", CheckStatus::Success)])).await;
        assert_eq!(rx.recv().await.unwrap().cycle_id, 1);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_oldest() {
        let aggregator = ResultAggregator::with_sink_buffer(10, 2);
        let mut rx = aggregator.subscribe();

        for id in 1..=4 {
            aggregator.record(report(id, &[])).await;
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().cycle_id, 3);
        assert_eq!(rx.recv().await.unwrap().cycle_id, 4);
    }

    struct Collecting(Mutex<Vec<u64>>);

    #[async_trait]
    impl ReportSink for Collecting {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn on_report(&self, report: Arc<CycleReport>) {
            self.0.lock().await.push(report.cycle_id);
        }
    }

    #[tokio::test]
    async fn test_add_sink_delivers() {
        let aggregator = ResultAggregator::new(10);
        let sink = Arc::new(Collecting(Mutex::new(Vec::new())));
        let _handle = aggregator.add_sink(sink.clone());

        aggregator.record(report(1, &[])).await;
        aggregator.record(report(2, &[])).await;

        for _ in 0..100 {
            if sink.0.lock().await.len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*sink.0.lock().await, vec![1, 2]);
    }
}
