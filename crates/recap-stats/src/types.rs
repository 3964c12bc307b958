//! Core types for activity snapshots.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Schema version stamped on every published snapshot.
///
/// Records carrying any other version are ignored for reconciliation and
/// percentile ranking.
pub const SCHEMA_VERSION: u32 = 1;

/// A half-open `[since, until)` window in unix seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Period {
    pub since: u64,
    pub until: u64,
}

impl Period {
    pub fn new(since: u64, until: u64) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.since && timestamp < self.until
    }

    /// Window length in seconds (0 for an inverted window).
    pub fn span(&self) -> u64 {
        self.until.saturating_sub(self.since)
    }
}

/// Count, total and rounded average of zap amounts in sats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZapTotals {
    pub count: u64,
    pub total_sats: u64,
    pub average_sats: u64,
}

impl ZapTotals {
    /// Record one zap. Zero-value zaps are not counted.
    pub fn record(&mut self, sats: u64) {
        if sats == 0 {
            return;
        }
        self.count += 1;
        self.total_sats = self.total_sats.saturating_add(sats);
        self.average_sats = (self.total_sats as f64 / self.count as f64).round() as u64;
    }
}

/// One of the subject's posts ranked by reactions received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopPost {
    pub id: String,
    pub content: String,
    pub created_at: u64,
    pub reaction_count: u64,
}

/// A reaction glyph and how often the subject used it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCount {
    pub glyph: String,
    pub count: u64,
}

/// One entry in the affinity ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AffinityEntry {
    /// Hex pubkey of the other identity.
    pub pubkey: String,
    pub reactions_sent: u64,
    pub replies_sent: u64,
    pub reactions_received: u64,
    pub replies_received: u64,
    /// Mutuality in `[0, 1]`; 1.0 means sent and received are equal.
    pub balance: f64,
    /// `reactionsSent + 2*repliesSent + reactionsReceived + 2*repliesReceived`.
    pub weighted_score: u64,
}

/// The serializable metric set of a snapshot.
///
/// Every field defaults so records written by older builds still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityStats {
    pub kind1_count: u64,
    pub kind1_chars: u64,
    pub reply_count: u64,
    pub kind6_count: u64,
    pub kind7_count: u64,
    pub kind42_count: u64,
    pub kind30023_count: u64,
    pub kind30023_chars: u64,
    pub image_count: u64,
    pub reactions_received: u64,
    pub replies_received: u64,
    pub zaps_sent: ZapTotals,
    pub zaps_received: ZapTotals,
    pub top_posts: Vec<TopPost>,
    pub top_reactions: Vec<ReactionCount>,
    /// `YYYY-MM` -> events, at the configured activity offset.
    pub monthly_activity: BTreeMap<String, u64>,
    /// Hour of day (0-23) -> events, at the configured activity offset.
    pub hourly_activity: [u64; 24],
}

impl ActivityStats {
    /// Reactions on the best post, 0 without any reacted-to post.
    pub fn top_post_reactions(&self) -> u64 {
        self.top_posts.first().map(|p| p.reaction_count).unwrap_or(0)
    }
}

/// One subject's aggregate over one window and relay set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Hex pubkey of the subject.
    pub subject: String,
    pub version: u32,
    pub relays: Vec<String>,
    pub period: Period,
    pub stats: ActivityStats,
    /// Local-only; never published.
    pub affinity: Vec<AffinityEntry>,
}

impl StatsSnapshot {
    pub fn new(
        subject: &str,
        relays: &[String],
        period: Period,
        stats: ActivityStats,
        affinity: Vec<AffinityEntry>,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            version: SCHEMA_VERSION,
            relays: relays.to_vec(),
            period,
            stats,
            affinity,
        }
    }

    /// Rebuild a snapshot from a published record. The affinity ranking is
    /// not part of the wire format and comes back empty.
    pub fn from_published(subject: &str, published: &PublishedSnapshot) -> Self {
        Self {
            subject: subject.to_string(),
            version: published.version,
            relays: published.relays.clone(),
            period: published.period,
            stats: published.stats.clone(),
            affinity: Vec::new(),
        }
    }

    pub fn to_published(&self) -> PublishedSnapshot {
        PublishedSnapshot {
            version: self.version,
            relays: self.relays.clone(),
            period: self.period,
            stats: self.stats.clone(),
        }
    }
}

/// Durable JSON form of a snapshot, stored as the content of an
/// addressable record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    pub version: u32,
    pub relays: Vec<String>,
    pub period: Period,
    #[serde(flatten)]
    pub stats: ActivityStats,
}

impl PublishedSnapshot {
    pub fn is_current(&self) -> bool {
        self.version == SCHEMA_VERSION
    }
}

fn normalize_relay(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Compare two relay lists as unordered sets, ignoring trailing slashes
/// and letter case.
pub fn same_relay_set(a: &[String], b: &[String]) -> bool {
    let left: BTreeSet<String> = a.iter().map(|r| normalize_relay(r)).collect();
    let right: BTreeSet<String> = b.iter().map(|r| normalize_relay(r)).collect();
    left == right
}
