//! Published snapshot lookups: cache reconciliation, population and recent
//! listing, plus the subject's profile.

use crate::retrieval::{fetch_merged, EventQuery, EventSource};
use nostr_core::ProfileMetadata;
use recap_stats::event::{snapshot_d_tag, KIND_APP_SPECIFIC, KIND_METADATA, NAMESPACE};
use recap_stats::{same_relay_set, snapshot_from_event, Period, RawEvent, SnapshotRecord};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Decode snapshot records, skipping anything malformed.
pub fn decode_records(events: &[RawEvent]) -> Vec<SnapshotRecord> {
    events
        .iter()
        .filter_map(|event| match snapshot_from_event(event) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping record {}: {e}", event.id);
                None
            }
        })
        .collect()
}

/// The newest of the subject's own records matching version, relay set
/// and window exactly.
pub fn select_cached<'a>(
    records: &'a [SnapshotRecord],
    subject: &str,
    relays: &[String],
    period: Period,
) -> Option<&'a SnapshotRecord> {
    records
        .iter()
        .filter(|r| r.author == subject)
        .filter(|r| r.snapshot.is_current())
        .filter(|r| r.snapshot.period == period)
        .filter(|r| same_relay_set(&r.snapshot.relays, relays))
        .max_by_key(|r| r.created_at)
}

/// Look up a previously published snapshot for this exact request.
pub async fn find_cached(
    source: &dyn EventSource,
    relays: &[String],
    subject: &str,
    period: Period,
) -> Option<SnapshotRecord> {
    let query = EventQuery::new()
        .author(subject)
        .kinds([KIND_APP_SPECIFIC])
        .identifier(snapshot_d_tag(&period));
    let records = decode_records(&fetch_merged(source, relays, &query).await);
    let cached = select_cached(&records, subject, relays, period).cloned();
    debug!(
        "{} published record(s) for this window, cache {}",
        records.len(),
        if cached.is_some() { "hit" } else { "miss" }
    );
    cached
}

/// Published snapshot records across all authors, newest first as
/// delivered, capped at `limit` per relay.
pub async fn fetch_population(source: &dyn EventSource, relays: &[String], limit: usize) -> Vec<SnapshotRecord> {
    let query = EventQuery::new()
        .kinds([KIND_APP_SPECIFIC])
        .topic(NAMESPACE)
        .limit(limit);
    decode_records(&fetch_merged(source, relays, &query).await)
}

/// A record in the recent listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRecord {
    pub author: String,
    pub event_id: String,
    pub created_at: u64,
    pub period: Period,
    pub kind1_count: u64,
    /// False when written by a different schema version.
    pub compatible: bool,
}

impl From<&SnapshotRecord> for RecentRecord {
    fn from(record: &SnapshotRecord) -> Self {
        Self {
            author: record.author.clone(),
            event_id: record.event_id.clone(),
            created_at: record.created_at,
            period: record.snapshot.period,
            kind1_count: record.snapshot.stats.kind1_count,
            compatible: record.snapshot.is_current(),
        }
    }
}

/// Newest record per author, newest first, at most `limit`.
pub fn dedupe_recent(records: &[SnapshotRecord], limit: usize) -> Vec<RecentRecord> {
    let mut newest: HashMap<&str, &SnapshotRecord> = HashMap::new();
    for record in records {
        match newest.get(record.author.as_str()) {
            Some(existing) if existing.created_at >= record.created_at => {}
            _ => {
                newest.insert(record.author.as_str(), record);
            }
        }
    }

    let mut recent: Vec<RecentRecord> = newest.into_values().map(RecentRecord::from).collect();
    recent.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.author.cmp(&b.author))
    });
    recent.truncate(limit);
    recent
}

/// Recently published snapshots, one per author, across schema versions.
pub async fn list_recent(source: &dyn EventSource, relays: &[String], limit: usize) -> Vec<RecentRecord> {
    // Over-fetch so that repeat authors do not starve the listing.
    let records = fetch_population(source, relays, limit.saturating_mul(4)).await;
    dedupe_recent(&records, limit)
}

/// Latest kind 0 profile of the subject across relays.
pub async fn fetch_profile(source: &dyn EventSource, relays: &[String], subject: &str) -> Option<ProfileMetadata> {
    let query = EventQuery::new().author(subject).kinds([KIND_METADATA]).limit(1);
    let events = fetch_merged(source, relays, &query).await;

    events
        .iter()
        .filter(|e| e.pubkey == subject)
        .filter_map(|e| {
            let parsed = ProfileMetadata::from_json(&e.content, e.created_at);
            if parsed.is_none() {
                debug!("Malformed profile metadata in {}", e.id);
            }
            parsed
        })
        .fold(None, |best, profile| ProfileMetadata::newest(best, Some(profile)))
}
