//! Lightweight event representation and conversion of snapshots to/from
//! NIP-78 addressable records.
//!
//! This module works with a generic tag-based representation rather than
//! depending on nostr-sdk directly, keeping the crate lightweight.
//! Integrators convert to/from their concrete Nostr event types.

use crate::types::{Period, PublishedSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KIND_METADATA: u16 = 0;
pub const KIND_TEXT_NOTE: u16 = 1;
pub const KIND_REPOST: u16 = 6;
pub const KIND_REACTION: u16 = 7;
pub const KIND_CHANNEL_MESSAGE: u16 = 42;
pub const KIND_ZAP_REQUEST: u16 = 9734;
pub const KIND_ZAP_RECEIPT: u16 = 9735;
pub const KIND_LONG_FORM: u16 = 30023;
/// NIP-78 event kind for application-specific data.
pub const KIND_APP_SPECIFIC: u16 = 30078;

/// Namespace shared by the d-tag and the discovery topic.
pub const NAMESPACE: &str = "nostr-recap";
/// Prefix of the d-tag that addresses one snapshot per window.
pub const D_TAG_PREFIX: &str = "nostr-recap:stats:";
/// Single-letter tag carrying the schema version.
pub const TAG_VERSION: &str = "v";
/// Single-letter topic tag used for discovery.
pub const TAG_TOPIC: &str = "t";

/// A Nostr event as retrieved from a relay. Never mutated after retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    pub id: String,
    pub pubkey: String,
    pub kind: u16,
    pub created_at: u64,
    /// Tags as arrays; the first element is the tag name.
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl RawEvent {
    /// Values (second element) of every tag with the given name, in order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(|n| n.as_str()) == Some(name))
            .filter_map(|tag| tag.get(1).map(|v| v.as_str()))
    }

    pub fn first_tag_value<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.tag_values(name).next()
    }

    pub fn last_tag_value<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.tag_values(name).last()
    }

    /// Distinct `p`-tag pubkeys in first-seen order.
    pub fn referenced_pubkeys(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for pk in self.tag_values("p") {
            if !seen.contains(&pk) {
                seen.push(pk);
            }
        }
        seen
    }

    pub fn references_pubkey(&self, pubkey: &str) -> bool {
        self.tag_values("p").any(|pk| pk == pubkey)
    }

    /// A note referencing another event through an `e` tag.
    pub fn is_reply(&self) -> bool {
        self.first_tag_value("e").is_some()
    }
}

/// A decoded snapshot record together with its event metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub event_id: String,
    pub author: String,
    pub created_at: u64,
    pub snapshot: PublishedSnapshot,
}

/// Errors from snapshot record conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("wrong event kind: {0}, expected 30078")]
    WrongKind(u16),
    #[error("missing required tag: {0}")]
    MissingTag(String),
    #[error("invalid d-tag: '{0}', expected prefix 'nostr-recap:stats:'")]
    InvalidDTag(String),
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("v tag says version {tag}, content says {content}")]
    VersionMismatch { tag: u32, content: u32 },
}

/// The d-tag addressing a snapshot for one window.
pub fn snapshot_d_tag(period: &Period) -> String {
    format!("{}{}:{}", D_TAG_PREFIX, period.since, period.until)
}

/// Tags for a published snapshot record.
pub fn snapshot_tags(snapshot: &PublishedSnapshot) -> Vec<Vec<String>> {
    vec![
        vec!["d".to_string(), snapshot_d_tag(&snapshot.period)],
        vec![TAG_TOPIC.to_string(), NAMESPACE.to_string()],
        vec![TAG_VERSION.to_string(), snapshot.version.to_string()],
    ]
}

/// Schema version advertised by a record's `v` tag, if parseable.
pub fn record_version(event: &RawEvent) -> Option<u32> {
    event.first_tag_value(TAG_VERSION)?.parse().ok()
}

/// Decode a snapshot record. Validates kind, d-tag and JSON content, and
/// that a `v` tag, when present, agrees with the content's version.
/// Whether the version is current is left to the caller.
pub fn snapshot_from_event(event: &RawEvent) -> Result<SnapshotRecord, ConversionError> {
    if event.kind != KIND_APP_SPECIFIC {
        return Err(ConversionError::WrongKind(event.kind));
    }

    let d_tag = event
        .first_tag_value("d")
        .ok_or_else(|| ConversionError::MissingTag("d".to_string()))?;
    if !d_tag.starts_with(D_TAG_PREFIX) {
        return Err(ConversionError::InvalidDTag(d_tag.to_string()));
    }

    let snapshot: PublishedSnapshot = serde_json::from_str(&event.content)
        .map_err(|e| ConversionError::InvalidContent(e.to_string()))?;

    if let Some(tagged) = record_version(event) {
        if tagged != snapshot.version {
            return Err(ConversionError::VersionMismatch {
                tag: tagged,
                content: snapshot.version,
            });
        }
    }

    Ok(SnapshotRecord {
        event_id: event.id.clone(),
        author: event.pubkey.clone(),
        created_at: event.created_at,
        snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityStats, SCHEMA_VERSION};

    fn note(tags: Vec<Vec<&str>>) -> RawEvent {
        RawEvent {
            id: "id".to_string(),
            pubkey: "author".to_string(),
            kind: KIND_TEXT_NOTE,
            created_at: 0,
            tags: tags
                .into_iter()
                .map(|t| t.into_iter().map(String::from).collect())
                .collect(),
            content: String::new(),
        }
    }

    fn sample_published() -> PublishedSnapshot {
        PublishedSnapshot {
            version: SCHEMA_VERSION,
            relays: vec!["wss://nos.lol".to_string()],
            period: Period::new(1_700_000_000, 1_731_622_400),
            stats: ActivityStats {
                kind1_count: 12,
                ..Default::default()
            },
        }
    }

    fn record_event(content: String, tags: Vec<Vec<String>>) -> RawEvent {
        RawEvent {
            id: "rec".to_string(),
            pubkey: "deadbeef".to_string(),
            kind: KIND_APP_SPECIFIC,
            created_at: 42,
            tags,
            content,
        }
    }

    #[test]
    fn referenced_pubkeys_are_distinct_and_ordered() {
        let event = note(vec![
            vec!["p", "bob"],
            vec!["e", "root"],
            vec!["p", "alice"],
            vec!["p", "bob"],
        ]);
        assert_eq!(event.referenced_pubkeys(), vec!["bob", "alice"]);
        assert!(event.is_reply());
    }

    #[test]
    fn tag_without_value_is_skipped() {
        let event = note(vec![vec!["e"], vec!["p", "carol"]]);
        assert!(!event.is_reply());
        assert_eq!(event.first_tag_value("p"), Some("carol"));
    }

    #[test]
    fn last_tag_value_picks_final_match() {
        let event = note(vec![vec!["e", "root"], vec!["e", "target"]]);
        assert_eq!(event.last_tag_value("e"), Some("target"));
    }

    #[test]
    fn tag_lookup_with_runtime_name() {
        let event = note(vec![vec!["d", "first"], vec!["t", "x"], vec!["d", "second"]]);
        let name = String::from("d");
        assert_eq!(event.first_tag_value(&name), Some("first"));
        assert_eq!(event.last_tag_value(&name), Some("second"));
        assert_eq!(event.first_tag_value(&String::from("v")), None);
    }

    #[test]
    fn decode_snapshot_record() {
        let published = sample_published();
        let event = record_event(
            serde_json::to_string(&published).unwrap(),
            snapshot_tags(&published),
        );

        let record = snapshot_from_event(&event).unwrap();
        assert_eq!(record.author, "deadbeef");
        assert_eq!(record.created_at, 42);
        assert_eq!(record.snapshot, published);
        assert_eq!(record_version(&event), Some(SCHEMA_VERSION));
    }

    #[test]
    fn reject_disagreeing_version_tag() {
        let published = sample_published();
        let mut tags = snapshot_tags(&published);
        for tag in &mut tags {
            if tag[0] == TAG_VERSION {
                tag[1] = (SCHEMA_VERSION + 1).to_string();
            }
        }
        let event = record_event(serde_json::to_string(&published).unwrap(), tags);
        assert_eq!(
            snapshot_from_event(&event),
            Err(ConversionError::VersionMismatch {
                tag: SCHEMA_VERSION + 1,
                content: SCHEMA_VERSION
            })
        );

        // Records without a version tag are still accepted.
        let tags = vec![vec!["d".to_string(), snapshot_d_tag(&published.period)]];
        let event = record_event(serde_json::to_string(&published).unwrap(), tags);
        assert!(snapshot_from_event(&event).is_ok());
    }

    #[test]
    fn d_tag_encodes_window() {
        let tag = snapshot_d_tag(&Period::new(10, 20));
        assert_eq!(tag, "nostr-recap:stats:10:20");
    }

    #[test]
    fn reject_wrong_kind() {
        let mut event = record_event("{}".to_string(), vec![]);
        event.kind = 1;
        assert!(matches!(
            snapshot_from_event(&event),
            Err(ConversionError::WrongKind(1))
        ));
    }

    #[test]
    fn reject_foreign_d_tag() {
        let event = record_event(
            "{}".to_string(),
            vec![vec!["d".to_string(), "snow:memory:x".to_string()]],
        );
        assert!(matches!(
            snapshot_from_event(&event),
            Err(ConversionError::InvalidDTag(_))
        ));
    }

    #[test]
    fn reject_malformed_content() {
        let published = sample_published();
        let event = record_event("not json".to_string(), snapshot_tags(&published));
        assert!(matches!(
            snapshot_from_event(&event),
            Err(ConversionError::InvalidContent(_))
        ));
    }
}
