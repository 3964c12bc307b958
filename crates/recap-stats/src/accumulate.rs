//! Folding retrieved events into activity statistics.
//!
//! The fold is pure: the same events produce the same statistics in any
//! order, except that ties in the top-N lists keep first-seen order.

use crate::config::StatsConfig;
use crate::content;
use crate::dedup::EventDedup;
use crate::event::{
    RawEvent, KIND_CHANNEL_MESSAGE, KIND_LONG_FORM, KIND_REACTION, KIND_REPOST, KIND_TEXT_NOTE,
    KIND_ZAP_RECEIPT, KIND_ZAP_REQUEST,
};
use crate::types::{ActivityStats, ReactionCount, TopPost};
use crate::zap;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Glyph recorded for a reaction with empty content.
pub const DEFAULT_REACTION_GLYPH: &str = "+";

/// Directional interaction counts between the subject and one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionCounts {
    pub reactions_sent: u64,
    pub replies_sent: u64,
    pub reactions_received: u64,
    pub replies_received: u64,
}

impl InteractionCounts {
    pub fn total_sent(&self) -> u64 {
        self.reactions_sent + self.replies_sent
    }

    pub fn total_received(&self) -> u64 {
        self.reactions_received + self.replies_received
    }
}

/// Output of one accumulation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulated {
    pub stats: ActivityStats,
    /// Keyed by the other identity's hex pubkey.
    pub interactions: BTreeMap<String, InteractionCounts>,
}

/// Fold the three retrieval streams into statistics for `subject`.
///
/// Each stream is deduplicated by event id, so an event delivered twice
/// counts once.
pub fn accumulate(
    own: &[RawEvent],
    incoming: &[RawEvent],
    sent_zaps: &[RawEvent],
    subject: &str,
    config: &StatsConfig,
) -> Accumulated {
    let mut acc = Accumulator::new(subject, config);

    // Requests already proven paid by a sent receipt.
    let receipted: HashSet<String> = sent_zaps
        .iter()
        .filter_map(zap::embedded_request)
        .map(|request| request.id)
        .collect();

    let mut seen = EventDedup::new();
    for event in own.iter().filter(|e| seen.check_and_insert(&e.id)) {
        acc.fold_own(event, &receipted);
    }

    let mut seen = EventDedup::new();
    for event in incoming.iter().filter(|e| seen.check_and_insert(&e.id)) {
        acc.fold_incoming(event);
    }

    let mut seen = EventDedup::new();
    for event in sent_zaps.iter().filter(|e| seen.check_and_insert(&e.id)) {
        acc.fold_sent_zap(event);
    }

    acc.finish()
}

struct PostTally {
    id: String,
    content: String,
    created_at: u64,
    reactions: u64,
}

struct Accumulator<'a> {
    subject: &'a str,
    config: &'a StatsConfig,
    offset: FixedOffset,
    stats: ActivityStats,
    posts: Vec<PostTally>,
    post_index: HashMap<String, usize>,
    glyphs: Vec<ReactionCount>,
    glyph_index: HashMap<String, usize>,
    interactions: BTreeMap<String, InteractionCounts>,
}

impl<'a> Accumulator<'a> {
    fn new(subject: &'a str, config: &'a StatsConfig) -> Self {
        let offset = FixedOffset::east_opt(config.activity_timezone_offset_minutes * 60)
            .unwrap_or_else(|| {
                log::warn!(
                    "activity offset {} min out of range, bucketing in UTC",
                    config.activity_timezone_offset_minutes
                );
                Utc.fix()
            });

        Self {
            subject,
            config,
            offset,
            stats: ActivityStats::default(),
            posts: Vec::new(),
            post_index: HashMap::new(),
            glyphs: Vec::new(),
            glyph_index: HashMap::new(),
            interactions: BTreeMap::new(),
        }
    }

    fn interaction(&mut self, pubkey: &str) -> &mut InteractionCounts {
        self.interactions.entry(pubkey.to_string()).or_default()
    }

    fn bucket(&mut self, created_at: u64) {
        let Some(utc) = i64::try_from(created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        else {
            return;
        };
        let local = utc.with_timezone(&self.offset);
        *self
            .stats
            .monthly_activity
            .entry(local.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        self.stats.hourly_activity[local.hour() as usize] += 1;
    }

    fn fold_own(&mut self, event: &RawEvent, receipted: &HashSet<String>) {
        if event.pubkey != self.subject {
            log::debug!("skipping {} in own stream: foreign author", event.id);
            return;
        }

        match event.kind {
            KIND_TEXT_NOTE => self.fold_post(event),
            KIND_REPOST => {
                self.stats.kind6_count += 1;
                self.bucket(event.created_at);
            }
            KIND_REACTION => self.fold_reaction_sent(event),
            KIND_CHANNEL_MESSAGE => {
                self.stats.kind42_count += 1;
                self.bucket(event.created_at);
            }
            KIND_LONG_FORM => {
                self.stats.kind30023_count += 1;
                self.stats.kind30023_chars += content::char_count(&event.content);
                self.bucket(event.created_at);
            }
            KIND_ZAP_REQUEST => self.fold_zap_request(event, receipted),
            other => log::debug!("ignoring own event {} of kind {other}", event.id),
        }
    }

    fn fold_post(&mut self, event: &RawEvent) {
        self.stats.kind1_count += 1;
        self.stats.kind1_chars += content::char_count(&event.content);
        self.stats.image_count += content::image_count(&event.content);

        self.post_index.insert(event.id.clone(), self.posts.len());
        self.posts.push(PostTally {
            id: event.id.clone(),
            content: event.content.clone(),
            created_at: event.created_at,
            reactions: 0,
        });

        if event.is_reply() {
            self.stats.reply_count += 1;
            for pubkey in event.referenced_pubkeys() {
                if pubkey != self.subject {
                    self.interaction(pubkey).replies_sent += 1;
                }
            }
        }

        self.bucket(event.created_at);
    }

    fn fold_reaction_sent(&mut self, event: &RawEvent) {
        self.stats.kind7_count += 1;

        for pubkey in event.referenced_pubkeys() {
            if pubkey != self.subject {
                self.interaction(pubkey).reactions_sent += 1;
            }
        }

        let glyph = if event.content.is_empty() {
            DEFAULT_REACTION_GLYPH
        } else {
            event.content.as_str()
        };
        match self.glyph_index.get(glyph) {
            Some(&idx) => self.glyphs[idx].count += 1,
            None => {
                self.glyph_index.insert(glyph.to_string(), self.glyphs.len());
                self.glyphs.push(ReactionCount {
                    glyph: glyph.to_string(),
                    count: 1,
                });
            }
        }

        self.bucket(event.created_at);
    }

    /// Own zap requests only count when no sent receipt covers them.
    fn fold_zap_request(&mut self, request: &RawEvent, receipted: &HashSet<String>) {
        if receipted.contains(&request.id) {
            return;
        }
        if zap::zap_recipient(request) == Some(self.subject) {
            return;
        }
        self.stats.zaps_sent.record(zap::request_amount_sats(request));
    }

    fn fold_incoming(&mut self, event: &RawEvent) {
        if event.pubkey == self.subject {
            return;
        }

        match event.kind {
            KIND_REACTION => {
                // NIP-25: the reacted-to event is the last `e` tag.
                let Some(target) = event.last_tag_value("e") else {
                    return;
                };
                let Some(&idx) = self.post_index.get(target) else {
                    log::debug!("reaction {} targets a post outside the window", event.id);
                    return;
                };
                self.posts[idx].reactions += 1;
                self.stats.reactions_received += 1;
                self.interaction(&event.pubkey).reactions_received += 1;
            }
            KIND_TEXT_NOTE => {
                if event.is_reply() && event.references_pubkey(self.subject) {
                    self.stats.replies_received += 1;
                    self.interaction(&event.pubkey).replies_received += 1;
                }
            }
            KIND_ZAP_RECEIPT => {
                if zap::zap_recipient(event) != Some(self.subject) {
                    return;
                }
                if zap::zap_sender(event).as_deref() == Some(self.subject) {
                    return;
                }
                self.stats.zaps_received.record(zap::receipt_amount_sats(event));
            }
            _ => {}
        }
    }

    fn fold_sent_zap(&mut self, receipt: &RawEvent) {
        if receipt.kind != KIND_ZAP_RECEIPT {
            return;
        }
        if zap::zap_sender(receipt).as_deref() != Some(self.subject) {
            return;
        }
        if zap::zap_recipient(receipt) == Some(self.subject) {
            return;
        }
        self.stats.zaps_sent.record(zap::receipt_amount_sats(receipt));
    }

    fn finish(mut self) -> Accumulated {
        // Stable sorts: ties keep first-seen order.
        self.posts.sort_by(|a, b| b.reactions.cmp(&a.reactions));
        self.stats.top_posts = self
            .posts
            .into_iter()
            .filter(|p| p.reactions > 0)
            .take(self.config.top_posts)
            .map(|p| TopPost {
                id: p.id,
                content: p.content,
                created_at: p.created_at,
                reaction_count: p.reactions,
            })
            .collect();

        self.glyphs.sort_by(|a, b| b.count.cmp(&a.count));
        self.glyphs.truncate(self.config.top_reactions);
        self.stats.top_reactions = self.glyphs;

        Accumulated {
            stats: self.stats,
            interactions: self.interactions,
        }
    }
}
