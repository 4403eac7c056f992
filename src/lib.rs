//! Cycle-accurate micro-benchmarks of system call, futex hand-off and
//! `sched_yield` latency on Linux.

pub mod app;
pub mod bench;
pub mod buffer;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod sched;
pub mod sync;
