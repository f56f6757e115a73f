//! gator: a command-line RSS aggregator.
//!
//! Users register feed sources; `agg` runs a [`scheduler::Scheduler`] that
//! fetches one source per tick and stores new items as posts in SQLite.

pub mod cli;
pub mod config;
pub mod feed;
pub mod scheduler;
pub mod storage;
pub mod util;
