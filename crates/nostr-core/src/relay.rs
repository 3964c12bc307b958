//! Nostr relay client wrapper.

use anyhow::{Context, Result};
use futures_util::stream::{BoxStream, StreamExt};
use nostr_sdk::prelude::*;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Relay client addressing relays one at a time.
///
/// Keys are optional; without them the client is read-only and
/// [`RelayClient::sign`] fails.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    keys: Option<Keys>,
    relays: Vec<String>,
    timeout: Duration,
}

impl RelayClient {
    /// Create a client and connect to the given relays. Relays that cannot
    /// be added are logged and left out of the pool.
    pub async fn new(keys: Option<Keys>, relay_urls: Vec<String>, timeout: Duration) -> Self {
        let client = match &keys {
            Some(keys) => Client::new(keys.clone()),
            None => Client::default(),
        };

        let mut added = 0;
        for relay_url in &relay_urls {
            match client.add_relay(relay_url.as_str()).await {
                Ok(_) => added += 1,
                Err(e) => warn!("Skipping relay {relay_url}: {e}"),
            }
        }

        client.connect().await;
        info!(
            "Relay client connected to {added}/{} relay(s), {}",
            relay_urls.len(),
            if keys.is_some() { "signing enabled" } else { "read-only" }
        );

        Self {
            client,
            keys,
            relays: relay_urls,
            timeout,
        }
    }

    /// Get relay URLs.
    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.keys.as_ref().map(|k| k.public_key())
    }

    /// Stream events matching the filter from a single relay as they
    /// arrive. The stream ends at EOSE or when the timeout elapses; events
    /// delivered before a timeout are kept.
    pub async fn stream_from(&self, relay: &str, filter: Filter) -> Result<BoxStream<'static, Event>> {
        let stream = self
            .client
            .stream_events_from([relay], filter, self.timeout)
            .await
            .with_context(|| format!("Failed to query {relay}"))?;
        debug!("{relay}: streaming events");
        Ok(stream.boxed())
    }

    /// Sign an event builder with our keys.
    pub fn sign(&self, builder: EventBuilder) -> Result<Event> {
        let keys = self.keys.as_ref().context("No signing keys configured")?;
        builder.sign_with_keys(keys).context("Failed to sign event")
    }

    /// Send a signed event to a single relay. Returns whether the relay
    /// accepted it.
    pub async fn publish_to(&self, relay: &str, event: &Event) -> Result<bool> {
        let output = self
            .client
            .send_event_to([relay], event)
            .await
            .with_context(|| format!("Failed to send event to {relay}"))?;

        for (url, reason) in &output.failed {
            warn!("{url} rejected {}: {reason}", event.id);
        }
        Ok(!output.success.is_empty())
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}
