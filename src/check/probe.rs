// src/check/probe.rs
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// `Ok` carries an optional human-readable detail for the report.
pub type ProbeResult = anyhow::Result<Option<String>>;

/// A single external security check (key health, anomaly scan, pentest, ...).
///
/// Implementations do not need to enforce their own deadline; the owning
/// `CheckUnit` applies the timeout and may abort the call.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> ProbeResult;
}

/// Adapter for async closures.
pub struct FnProbe<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send,
{
    async fn check(&self) -> ProbeResult {
        (self.f)().await
    }
}

pub fn probe_fn<F, Fut>(f: F) -> Arc<dyn Probe>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    Arc::new(FnProbe { f })
}

/// Adapter for synchronous checks. The closure runs on the blocking pool;
/// if the unit times out the closure keeps running until it returns.
pub struct BlockingProbe<F> {
    f: Arc<F>,
}

impl<F> BlockingProbe<F>
where
    F: Fn() -> ProbeResult + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Probe for BlockingProbe<F>
where
    F: Fn() -> ProbeResult + Send + Sync + 'static,
{
    async fn check(&self) -> ProbeResult {
        let f = self.f.clone();
        tokio::task::spawn_blocking(move || f()).await?
    }
}
