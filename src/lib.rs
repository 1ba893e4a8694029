// src/lib.rs
pub mod aggregator;
pub mod check;
pub mod config;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod service;

pub use aggregator::{CycleReport, ReportSink, ResultAggregator};
pub use check::{CheckOutcome, CheckStatus, CheckUnit, Probe};
pub use error::{MonitorError, ProbeError};
pub use scheduler::Scheduler;
pub use service::MonitorService;
