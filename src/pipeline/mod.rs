// src/pipeline/mod.rs

//! Pipeline entry points for announcer operations.
//!
//! - `run_poller`: Poll the stream forever and relay new announcements
//! - `run_once`: Run a single poll cycle
//! - `run_parse`: Inspect a saved stream payload

pub mod poll;
pub mod poller;

pub use poll::{build_poller, run_once, run_parse, run_poller};
pub use poller::{CycleReport, PollState, Poller};
