// src/scheduler/mod.rs
mod scheduler;

pub use scheduler::Scheduler;
