// src/check/mod.rs
mod adapters;
mod outcome;
mod probe;
mod unit;

pub use adapters::{build_probe, CommandProbe, HttpProbe};
pub use outcome::{CheckOutcome, CheckStatus};
pub(crate) use outcome::duration_ms;
pub use probe::{probe_fn, BlockingProbe, FnProbe, Probe, ProbeResult};
pub use unit::CheckUnit;
