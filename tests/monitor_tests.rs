// tests/monitor_tests.rs
use security_monitor::check::{probe_fn, BlockingProbe, ProbeResult};
use security_monitor::{
    CheckStatus, CheckUnit, MonitorError, MonitorService, ResultAggregator, Scheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn service(history: usize) -> MonitorService {
    MonitorService::new(Scheduler::new(Arc::new(ResultAggregator::new(history))))
}

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_scenario() {
    let service = service(10);

    let a = probe_fn(|| async { Ok(Some("keys valid".to_string())) });
    let b = probe_fn(|| async { ProbeResult::Err(anyhow::anyhow!("privacy budget exceeded")) });
    let c = probe_fn(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    });

    service.register(CheckUnit::new("A", a, Duration::from_secs(1)).unwrap()).await.unwrap();
    service.register(CheckUnit::new("B", b, Duration::from_secs(1)).unwrap()).await.unwrap();
    service.register(CheckUnit::new("C", c, Duration::from_secs(1)).unwrap()).await.unwrap();

    let mut reports = service.aggregator().subscribe();
    service.start(Duration::from_secs(5)).await.unwrap();

    let report = reports.recv().await.unwrap();
    let statuses: Vec<(&str, CheckStatus)> = report
        .outcomes
        .iter()
        .map(|o| (o.unit_name.as_str(), o.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("A", CheckStatus::Success),
            ("B", CheckStatus::Failure),
            ("C", CheckStatus::Timeout),
        ]
    );
    assert_eq!(report.failure_count(), 2);
    assert!(service.is_running().await);

    // The loop keeps going after failures.
    let second = reports.recv().await.unwrap();
    assert_eq!(second.cycle_id, 2);
    assert_eq!(second.outcomes.len(), 3);

    service.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_one_report_per_tick_despite_failures() {
    let service = service(100);
    for i in 0..4 {
        let probe = if i % 2 == 0 {
            probe_fn(|| async { Ok(None) })
        } else {
            probe_fn(|| async { ProbeResult::Err(anyhow::anyhow!("scan failed")) })
        };
        service
            .register(CheckUnit::new(format!("unit-{}", i), probe, Duration::from_millis(200)).unwrap())
            .await
            .unwrap();
    }

    service.start(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    service.stop().await.unwrap();

    let history = service.aggregator().history().await;
    assert_eq!(history.len(), 5);
    for (i, report) in history.iter().enumerate() {
        assert_eq!(report.cycle_id, i as u64 + 1);
        assert_eq!(report.outcomes.len(), 4);
    }

    let summary = service.aggregator().unit_summary("unit-1").unwrap();
    assert_eq!(summary.failures, 5);
    assert_eq!(summary.consecutive_non_success, 5);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_tick_finishes_tick_then_halts() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = invocations.clone();
    let probe = probe_fn(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(None)
        }
    });

    let service = service(10);
    service
        .register(CheckUnit::new("exploit-scan", probe, Duration::from_secs(2)).unwrap())
        .await
        .unwrap();

    service.start(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    service.stop().await.unwrap();

    let status = service.status().await.unwrap().unwrap();
    assert_eq!(status.cycle_id, 1);
    assert_eq!(status.outcomes[0].status, CheckStatus::Success);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(service.aggregator().history().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_while_stop_is_draining() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = invocations.clone();
    let probe = probe_fn(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(None)
        }
    });

    let service = Arc::new(service(10));
    service
        .register(CheckUnit::new("exploit-scan", probe, Duration::from_secs(2)).unwrap())
        .await
        .unwrap();

    service.start(Duration::from_secs(10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopper = {
        let service = service.clone();
        tokio::spawn(async move { service.stop().await })
    };
    while service.is_running().await {
        tokio::task::yield_now().await;
    }

    // The first loop is still finishing its tick.
    assert_eq!(service.start(Duration::from_secs(10)).await, Err(MonitorError::AlreadyRunning));
    assert_eq!(service.stop().await, Err(MonitorError::NotRunning));

    stopper.await.unwrap().unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // Once drained, a restart runs exactly one loop.
    service.start(Duration::from_secs(10)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(35)).await;
    service.stop().await.unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 5);
    let ids: Vec<u64> = service.aggregator().history().await.iter().map(|r| r.cycle_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_history_bound_holds_while_running() {
    let service = service(3);
    service
        .register(CheckUnit::new("keys", probe_fn(|| async { Ok(None) }), Duration::from_millis(50)).unwrap())
        .await
        .unwrap();

    service.start(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(6_500)).await;
    service.stop().await.unwrap();

    let ids: Vec<u64> = service
        .aggregator()
        .history()
        .await
        .iter()
        .map(|r| r.cycle_id)
        .collect();
    assert_eq!(ids, vec![5, 6, 7]);
}

#[tokio::test]
async fn test_blocking_probe_timeout_does_not_stall_cycle() {
    let blocking = Arc::new(BlockingProbe::new(|| {
        std::thread::sleep(Duration::from_millis(800));
        Ok(None)
    }));

    let mut scheduler = Scheduler::new(Arc::new(ResultAggregator::new(4)));
    scheduler
        .register(CheckUnit::new("hids", blocking, Duration::from_millis(100)).unwrap())
        .unwrap();
    scheduler
        .register(CheckUnit::new("keys", probe_fn(|| async { Ok(None) }), Duration::from_millis(100)).unwrap())
        .unwrap();

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.outcome("hids").unwrap().status, CheckStatus::Timeout);
    assert_eq!(report.outcome("keys").unwrap().status, CheckStatus::Success);
    assert!(report.duration < Duration::from_millis(600));
}

#[tokio::test]
async fn test_lifecycle_misuse() {
    let service = service(4);
    assert_eq!(service.stop().await, Err(MonitorError::NotRunning));
    assert_eq!(service.status().await.unwrap_err(), MonitorError::NotRunning);

    let err = CheckUnit::new("zero", probe_fn(|| async { Ok(None) }), Duration::ZERO).unwrap_err();
    assert!(matches!(err, MonitorError::Configuration(_)));
}
