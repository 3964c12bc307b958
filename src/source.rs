//! `nostr-sdk` backed event source and publisher.

use crate::publish::{PublishError, Publisher};
use crate::retrieval::{EventQuery, EventSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use nostr_core::nostr_sdk::prelude::*;
use nostr_core::RelayClient;
use recap_stats::publish::{SignedEvent, UnsignedEvent};
use recap_stats::RawEvent;

/// Flatten an SDK event into the transport-free representation.
pub fn raw_event(event: &Event) -> RawEvent {
    RawEvent {
        id: event.id.to_hex(),
        pubkey: event.pubkey.to_hex(),
        kind: event.kind.as_u16(),
        created_at: event.created_at.as_u64(),
        tags: event.tags.iter().map(|tag| tag.as_slice().to_vec()).collect(),
        content: event.content.clone(),
    }
}

/// Translate a query into a relay filter. Relay `until` is inclusive, so
/// the exclusive bound is sent as `until - 1`.
pub fn to_filter(query: &EventQuery) -> Result<Filter> {
    let mut filter = Filter::new();

    if !query.authors.is_empty() {
        let authors = query
            .authors
            .iter()
            .map(|a| PublicKey::from_hex(a).with_context(|| format!("Invalid author pubkey: {a}")))
            .collect::<Result<Vec<_>>>()?;
        filter = filter.authors(authors);
    }
    if !query.kinds.is_empty() {
        filter = filter.kinds(query.kinds.iter().map(|k| Kind::from(*k)));
    }
    if let Some(pubkey) = &query.referenced {
        let pubkey = PublicKey::from_hex(pubkey).with_context(|| format!("Invalid pubkey: {pubkey}"))?;
        filter = filter.pubkey(pubkey);
    }
    if let Some(sender) = &query.zap_sender {
        filter = filter.custom_tag(SingleLetterTag::uppercase(Alphabet::P), sender.clone());
    }
    if let Some(topic) = &query.topic {
        filter = filter.hashtag(topic.clone());
    }
    if let Some(identifier) = &query.identifier {
        filter = filter.identifier(identifier.clone());
    }
    if let Some(since) = query.since {
        filter = filter.since(Timestamp::from(since));
    }
    if let Some(until) = query.until {
        filter = filter.until(Timestamp::from(until.saturating_sub(1)));
    }
    if let Some(limit) = query.limit {
        filter = filter.limit(limit);
    }

    Ok(filter)
}

#[async_trait]
impl EventSource for RelayClient {
    async fn fetch(&self, relay: &str, query: &EventQuery) -> Result<BoxStream<'static, RawEvent>> {
        let filter = to_filter(query)?;
        let events = self.stream_from(relay, filter).await?;
        Ok(events.map(|event| raw_event(&event)).boxed())
    }
}

#[async_trait]
impl Publisher for RelayClient {
    fn public_key(&self) -> Option<String> {
        RelayClient::public_key(self).map(|pk| pk.to_hex())
    }

    fn sign(&self, event: UnsignedEvent) -> Result<SignedEvent, PublishError> {
        if RelayClient::public_key(self).is_none() {
            return Err(PublishError::SigningUnavailable);
        }

        let tags = event
            .tags
            .iter()
            .map(|tag| Tag::parse(tag.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PublishError::Signing(e.to_string()))?;
        let builder = EventBuilder::new(Kind::from(event.kind), event.content)
            .tags(tags)
            .custom_created_at(Timestamp::from(event.created_at));

        let signed = RelayClient::sign(self, builder).map_err(|e| PublishError::Signing(format!("{e:#}")))?;
        let raw = raw_event(&signed);
        Ok(SignedEvent {
            id: raw.id,
            pubkey: raw.pubkey,
            created_at: raw.created_at,
            kind: raw.kind,
            tags: raw.tags,
            content: raw.content,
            sig: signed.sig.to_string(),
        })
    }

    async fn publish(&self, relay: &str, event: &SignedEvent) -> Result<bool> {
        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        let event = Event::from_json(json).context("Invalid signed event")?;
        self.publish_to(relay, &event).await
    }
}
