//! Publishing a snapshot as a signed addressable record.

use async_trait::async_trait;
use futures_util::future::join_all;
use recap_stats::publish::{build_snapshot_event, SignedEvent, UnsignedEvent};
use recap_stats::{ConversionError, StatsSnapshot};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Signing and sending capability.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Hex pubkey of the signing identity, `None` when read-only.
    fn public_key(&self) -> Option<String>;

    fn sign(&self, event: UnsignedEvent) -> Result<SignedEvent, PublishError>;

    /// Send to one relay; `Ok(true)` when the relay accepted the event.
    async fn publish(&self, relay: &str, event: &SignedEvent) -> anyhow::Result<bool>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no signing key available")]
    SigningUnavailable,
    #[error("snapshot subject {subject} does not match signing key {signer}")]
    SubjectMismatch { subject: String, signer: String },
    #[error("signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Record(#[from] ConversionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PublishOutcome {
    /// No signing capability; nothing was sent.
    ReadOnly,
    Published {
        event_id: String,
        accepted: Vec<String>,
        rejected: Vec<String>,
    },
}

/// Sign the snapshot record once and send it to every relay concurrently.
///
/// Without keys this is a no-op returning [`PublishOutcome::ReadOnly`].
/// Relay failures are reported in the outcome, never as an error.
pub async fn publish_snapshot(
    publisher: &dyn Publisher,
    snapshot: &StatsSnapshot,
    relays: &[String],
    created_at: u64,
) -> Result<PublishOutcome, PublishError> {
    let Some(signer) = publisher.public_key() else {
        info!("No signing key, skipping publish");
        return Ok(PublishOutcome::ReadOnly);
    };
    if signer != snapshot.subject {
        return Err(PublishError::SubjectMismatch {
            subject: snapshot.subject.clone(),
            signer,
        });
    }

    let unsigned = build_snapshot_event(snapshot, created_at)?;
    let signed = match publisher.sign(unsigned) {
        Ok(signed) => signed,
        Err(PublishError::SigningUnavailable) => return Ok(PublishOutcome::ReadOnly),
        Err(e) => return Err(e),
    };

    let results = join_all(relays.iter().map(|relay| {
        let signed = &signed;
        async move { (relay.clone(), publisher.publish(relay, signed).await) }
    }))
    .await;

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (relay, result) in results {
        match result {
            Ok(true) => accepted.push(relay),
            Ok(false) => {
                warn!("{relay} did not accept snapshot {}", signed.id);
                rejected.push(relay);
            }
            Err(e) => {
                warn!("Failed to publish to {relay}: {e:#}");
                rejected.push(relay);
            }
        }
    }

    info!(
        "Published snapshot {} to {}/{} relay(s)",
        signed.id,
        accepted.len(),
        relays.len()
    );
    Ok(PublishOutcome::Published {
        event_id: signed.id,
        accepted,
        rejected,
    })
}
