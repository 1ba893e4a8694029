// src/server/handler.rs
use crate::aggregator::{CycleReport, ResultAggregator};
use crate::metrics::MetricsRegistry;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct StatusHandler {
    aggregator: Arc<ResultAggregator>,
    metrics: Option<Arc<MetricsRegistry>>,
    metrics_path: Arc<String>,
}

impl StatusHandler {
    pub fn new(aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            aggregator,
            metrics: None,
            metrics_path: Arc::new("/metrics".to_string()),
        }
    }

    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>, path: impl Into<String>) -> Self {
        self.metrics = Some(registry);
        self.metrics_path = Arc::new(path.into());
        self
    }

    /// `GET <metrics path>`: Prometheus text format.
    /// `GET /status`: latest cycle report.
    /// `GET /history`: retained reports, oldest first.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        if req.method() != Method::GET {
            return respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed");
        }

        let path = req.uri().path().to_string();
        match (&self.metrics, path.as_str()) {
            (Some(registry), p) if p == self.metrics_path.as_str() => respond(
                StatusCode::OK,
                "text/plain; version=0.0.4",
                registry.gather(),
            ),
            (_, "/status") => match self.aggregator.latest() {
                Some(report) => json(&*report),
                None => respond(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "text/plain",
                    "No cycle has completed yet",
                ),
            },
            (_, "/history") => {
                let history = self.aggregator.history().await;
                let reports: Vec<&CycleReport> = history.iter().map(|r| r.as_ref()).collect();
                json(&reports)
            }
            _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
        }
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => {
            error!("Failed to serialize status response: {}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Internal Server Error")
        }
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
