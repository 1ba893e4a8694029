// src/aggregator/mod.rs
mod aggregator;
mod report;
mod sink;

pub use aggregator::{ResultAggregator, UnitSummary};
pub use report::CycleReport;
pub use sink::{JsonLinesSink, LogSink, ReportSink};
