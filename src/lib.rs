//! Nostr activity recaps: fetch an identity's events for a time window,
//! aggregate them into a stats snapshot, rank it against published
//! snapshots and optionally publish it back as an addressable record.

pub mod config;
pub mod engine;
pub mod progress;
pub mod publish;
pub mod reconcile;
pub mod report;
pub mod retrieval;
pub mod source;

pub use config::Config;
pub use engine::{compute, StatsReport, StatsRequest};
