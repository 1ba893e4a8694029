// src/service/mod.rs
mod monitor;

pub use monitor::MonitorService;
