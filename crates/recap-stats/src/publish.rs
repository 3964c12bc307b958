//! Build snapshot records as unsigned Nostr events.
//!
//! Signing and relay transport are handled by the caller.

use crate::event::{snapshot_tags, ConversionError, RawEvent, KIND_APP_SPECIFIC};
use crate::types::StatsSnapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A signed Nostr event ready to be sent to relays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl SignedEvent {
    /// Drop the signature, keeping the retrieved-event view.
    pub fn into_raw(self) -> RawEvent {
        RawEvent {
            id: self.id,
            pubkey: self.pubkey,
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags,
            content: self.content,
        }
    }
}

/// An unsigned event that needs signing before publishing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl UnsignedEvent {
    /// NIP-01 event id: SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
    pub fn compute_id(&self) -> String {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content,
        ]);
        let serialized = serde_json::to_string(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(serialized.as_bytes()))
    }
}

/// Build the addressable record for a snapshot, authored by its subject.
///
/// The affinity ranking is left out; only the published form is encoded.
pub fn build_snapshot_event(
    snapshot: &StatsSnapshot,
    created_at: u64,
) -> Result<UnsignedEvent, ConversionError> {
    let published = snapshot.to_published();
    let content = serde_json::to_string(&published)
        .map_err(|e| ConversionError::InvalidContent(e.to_string()))?;

    Ok(UnsignedEvent {
        pubkey: snapshot.subject.clone(),
        created_at,
        kind: KIND_APP_SPECIFIC,
        tags: snapshot_tags(&published),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{record_version, snapshot_from_event};
    use crate::types::{ActivityStats, AffinityEntry, Period, SCHEMA_VERSION};

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot::new(
            "aabbccdd",
            &["wss://nos.lol".to_string()],
            Period::new(1_704_034_800, 1_735_657_200),
            ActivityStats {
                kind1_count: 42,
                ..Default::default()
            },
            vec![AffinityEntry {
                pubkey: "friend".to_string(),
                reactions_sent: 3,
                replies_sent: 0,
                reactions_received: 3,
                replies_received: 0,
                balance: 1.0,
                weighted_score: 6,
            }],
        )
    }

    #[test]
    fn builds_addressable_record() {
        let event = build_snapshot_event(&snapshot(), 1_735_700_000).unwrap();
        assert_eq!(event.kind, 30078);
        assert_eq!(event.pubkey, "aabbccdd");
        assert_eq!(
            event.tags[0],
            vec!["d".to_string(), "nostr-recap:stats:1704034800:1735657200".to_string()]
        );
        assert!(event.tags.contains(&vec!["t".to_string(), "nostr-recap".to_string()]));
        assert!(!event.content.contains("affinity"));
    }

    #[test]
    fn event_id_is_stable_hex() {
        let event = build_snapshot_event(&snapshot(), 1).unwrap();
        let id = event.compute_id();
        assert_eq!(id.len(), 64);
        assert_eq!(id, event.compute_id());

        let mut later = event.clone();
        later.created_at = 2;
        assert_ne!(id, later.compute_id());
    }

    #[test]
    fn signed_record_decodes_back() {
        let unsigned = build_snapshot_event(&snapshot(), 7).unwrap();
        let signed = SignedEvent {
            id: unsigned.compute_id(),
            pubkey: unsigned.pubkey.clone(),
            created_at: unsigned.created_at,
            kind: unsigned.kind,
            tags: unsigned.tags.clone(),
            content: unsigned.content.clone(),
            sig: "00".repeat(64),
        };

        let raw = signed.into_raw();
        assert_eq!(record_version(&raw), Some(SCHEMA_VERSION));
        let record = snapshot_from_event(&raw).unwrap();
        assert_eq!(record.snapshot, snapshot().to_published());
    }
}
