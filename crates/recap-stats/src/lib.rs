//! Activity aggregation, affinity ranking and percentile scoring for Nostr recaps.
//!
//! This crate is transport-free: it works on [`RawEvent`], a lightweight
//! representation of a Nostr event. Integrators convert their concrete
//! event types (e.g. `nostr_sdk::Event`) before folding them into a
//! [`StatsSnapshot`].

pub mod accumulate;
pub mod affinity;
pub mod config;
pub mod content;
pub mod dedup;
pub mod event;
pub mod percentile;
pub mod publish;
pub mod types;
pub mod zap;

pub use accumulate::{accumulate, Accumulated, InteractionCounts};
pub use affinity::{balance, rank_affinity};
pub use config::{AffinityAlgorithm, StatsConfig};
pub use dedup::EventDedup;
pub use event::{snapshot_from_event, ConversionError, RawEvent, SnapshotRecord};
pub use percentile::{percentile, select_population, Metric, PercentileReport};
pub use publish::{build_snapshot_event, SignedEvent, UnsignedEvent};
pub use types::{
    same_relay_set, ActivityStats, AffinityEntry, Period, PublishedSnapshot, ReactionCount,
    StatsSnapshot, TopPost, ZapTotals, SCHEMA_VERSION,
};
pub use zap::decode_invoice_amount_sats;
