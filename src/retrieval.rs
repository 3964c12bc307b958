//! Phased, deduplicated retrieval across relays.
//!
//! Phases run one after another; within a phase every relay is queried
//! concurrently and the streams are merged as events arrive.

use crate::progress::{Phase, ProgressTracker};
use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::{self, BoxStream, StreamExt};
use recap_stats::event::{
    KIND_CHANNEL_MESSAGE, KIND_LONG_FORM, KIND_REACTION, KIND_REPOST, KIND_TEXT_NOTE,
    KIND_ZAP_RECEIPT, KIND_ZAP_REQUEST,
};
use recap_stats::{EventDedup, Period, RawEvent};
use tracing::{debug, info, warn};

/// A relay query, independent of the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub authors: Vec<String>,
    pub kinds: Vec<u16>,
    /// `#p`: events referencing this pubkey.
    pub referenced: Option<String>,
    /// `#P`: zap receipts paid by this pubkey.
    pub zap_sender: Option<String>,
    /// `#t`
    pub topic: Option<String>,
    /// `#d`
    pub identifier: Option<String>,
    pub since: Option<u64>,
    /// Exclusive.
    pub until: Option<u64>,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.push(pubkey.into());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn referencing(mut self, pubkey: impl Into<String>) -> Self {
        self.referenced = Some(pubkey.into());
        self
    }

    pub fn zapped_by(mut self, pubkey: impl Into<String>) -> Self {
        self.zap_sender = Some(pubkey.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn window(mut self, period: Period) -> Self {
        self.since = Some(period.since);
        self.until = Some(period.until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an event satisfies every constraint except `limit`.
    pub fn matches(&self, event: &RawEvent) -> bool {
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(pubkey) = &self.referenced {
            if !event.references_pubkey(pubkey) {
                return false;
            }
        }
        if let Some(sender) = &self.zap_sender {
            if !event.tag_values("P").any(|v| v == sender) {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            if !event.tag_values("t").any(|v| v == topic) {
                return false;
            }
        }
        if let Some(identifier) = &self.identifier {
            if event.first_tag_value("d") != Some(identifier.as_str()) {
                return false;
            }
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at >= until) {
            return false;
        }
        true
    }
}

/// Where events come from.
///
/// Streams should yield events as the relay delivers them, newest first,
/// so that progress can be estimated while a phase runs. A failed relay is
/// reported as an error and the orchestrator carries on without it.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, relay: &str, query: &EventQuery) -> anyhow::Result<BoxStream<'static, RawEvent>>;
}

/// The three event sets one computation folds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieved {
    pub own: Vec<RawEvent>,
    pub incoming: Vec<RawEvent>,
    pub sent_zaps: Vec<RawEvent>,
}

/// Events authored by the subject.
pub fn own_events_query(subject: &str, period: Period) -> EventQuery {
    EventQuery::new()
        .author(subject)
        .kinds([
            KIND_TEXT_NOTE,
            KIND_REPOST,
            KIND_REACTION,
            KIND_CHANNEL_MESSAGE,
            KIND_LONG_FORM,
            KIND_ZAP_REQUEST,
        ])
        .window(period)
}

/// Posts, reactions and zap receipts referencing the subject.
pub fn incoming_events_query(subject: &str, period: Period) -> EventQuery {
    EventQuery::new()
        .referencing(subject)
        .kinds([KIND_TEXT_NOTE, KIND_REACTION, KIND_ZAP_RECEIPT])
        .window(period)
}

/// Zap receipts paid by the subject.
pub fn sent_zaps_query(subject: &str, period: Period) -> EventQuery {
    EventQuery::new()
        .zapped_by(subject)
        .kinds([KIND_ZAP_RECEIPT])
        .window(period)
}

/// Run the three retrieval phases in order.
///
/// Never fails: relays that error are skipped, and a phase nobody answers
/// comes back empty.
pub async fn retrieve(
    source: &dyn EventSource,
    subject: &str,
    relays: &[String],
    period: Period,
    progress: &mut ProgressTracker<'_>,
) -> Retrieved {
    let own = run_phase(
        source,
        relays,
        &own_events_query(subject, period),
        period,
        Phase::OwnEvents,
        progress,
    )
    .await;
    let incoming = run_phase(
        source,
        relays,
        &incoming_events_query(subject, period),
        period,
        Phase::IncomingEvents,
        progress,
    )
    .await;
    let sent_zaps = run_phase(
        source,
        relays,
        &sent_zaps_query(subject, period),
        period,
        Phase::SentZaps,
        progress,
    )
    .await;

    Retrieved {
        own,
        incoming,
        sent_zaps,
    }
}

async fn run_phase(
    source: &dyn EventSource,
    relays: &[String],
    query: &EventQuery,
    period: Period,
    phase: Phase,
    progress: &mut ProgressTracker<'_>,
) -> Vec<RawEvent> {
    progress.enter(phase, phase_message(phase));

    let streams = open_streams(source, relays, query).await;
    let responding = streams.len();
    let mut merged = stream::select_all(streams);

    let mut seen = EventDedup::new();
    let mut events = Vec::new();
    let mut duplicates = 0usize;
    while let Some(event) = merged.next().await {
        if !period.contains(event.created_at) {
            debug!("{phase:?}: dropping {} outside the window", event.id);
            continue;
        }
        if !seen.check_and_insert(&event.id) {
            duplicates += 1;
            continue;
        }
        progress.observe(phase, event.created_at);
        events.push(event);
    }

    info!(
        "{phase:?}: {} event(s) from {responding}/{} relay(s), {duplicates} duplicate(s)",
        events.len(),
        relays.len()
    );
    events
}

fn phase_message(phase: Phase) -> &'static str {
    match phase {
        Phase::OwnEvents => "Fetching own events",
        Phase::IncomingEvents => "Fetching reactions, replies and zaps",
        Phase::SentZaps => "Fetching sent zaps",
        _ => "Fetching events",
    }
}

/// Query every relay concurrently; failed relays are logged and dropped.
async fn open_streams(
    source: &dyn EventSource,
    relays: &[String],
    query: &EventQuery,
) -> Vec<BoxStream<'static, RawEvent>> {
    let attempts = join_all(relays.iter().map(|relay| async move {
        (relay.as_str(), source.fetch(relay, query).await)
    }))
    .await;

    let mut streams = Vec::with_capacity(attempts.len());
    for (relay, attempt) in attempts {
        match attempt {
            Ok(stream) => streams.push(stream),
            Err(e) => warn!("Relay {relay} failed: {e:#}"),
        }
    }
    if streams.is_empty() && !relays.is_empty() {
        warn!("No relay responded");
    }
    streams
}

/// Fan a query out to every relay and merge the results, deduplicated by
/// id. Used for lookups outside the progress-reporting phases.
pub async fn fetch_merged(source: &dyn EventSource, relays: &[String], query: &EventQuery) -> Vec<RawEvent> {
    let mut merged = stream::select_all(open_streams(source, relays, query).await);
    let mut seen = EventDedup::new();
    let mut events = Vec::new();
    while let Some(event) = merged.next().await {
        if seen.check_and_insert(&event.id) {
            events.push(event);
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressSink, ProgressUpdate};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressUpdate>>);

    impl ProgressSink for Recorder {
        fn report(&self, update: ProgressUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    impl Recorder {
        fn reached(&self, phase: Phase, percent: u8) -> bool {
            self.0
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.phase == phase && u.percent >= percent)
        }
    }

    /// Serves own events from a channel, one at a time, and nothing else.
    struct TrickleSource {
        own: Mutex<Option<mpsc::UnboundedReceiver<RawEvent>>>,
    }

    #[async_trait]
    impl EventSource for TrickleSource {
        async fn fetch(&self, _relay: &str, query: &EventQuery) -> anyhow::Result<BoxStream<'static, RawEvent>> {
            if !query.kinds.contains(&KIND_ZAP_REQUEST) {
                return Ok(stream::empty().boxed());
            }
            let Some(rx) = self.own.lock().unwrap().take() else {
                return Ok(stream::empty().boxed());
            };
            Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) }).boxed())
        }
    }

    fn event(id: &str, pubkey: &str, kind: u16, created_at: u64, tags: Vec<Vec<&str>>) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            pubkey: pubkey.to_string(),
            kind,
            created_at,
            tags: tags
                .into_iter()
                .map(|t| t.into_iter().map(String::from).collect())
                .collect(),
            content: String::new(),
        }
    }

    #[test]
    fn window_is_half_open() {
        let query = own_events_query("me", Period::new(100, 200));
        assert!(query.matches(&event("a", "me", 1, 100, vec![])));
        assert!(query.matches(&event("b", "me", 1, 199, vec![])));
        assert!(!query.matches(&event("c", "me", 1, 200, vec![])));
        assert!(!query.matches(&event("d", "me", 1, 99, vec![])));
    }

    #[test]
    fn own_query_filters_author_and_kind() {
        let query = own_events_query("me", Period::new(0, 10));
        assert!(!query.matches(&event("a", "you", 1, 5, vec![])));
        assert!(!query.matches(&event("b", "me", 0, 5, vec![])));
        assert!(query.matches(&event("c", "me", 9734, 5, vec![])));
    }

    #[test]
    fn incoming_query_requires_reference() {
        let query = incoming_events_query("me", Period::new(0, 10));
        assert!(query.matches(&event("a", "you", 7, 5, vec![vec!["p", "me"]])));
        assert!(!query.matches(&event("b", "you", 7, 5, vec![vec!["p", "them"]])));
        assert!(!query.matches(&event("c", "you", 6, 5, vec![vec!["p", "me"]])));
    }

    #[test]
    fn sent_zaps_query_uses_uppercase_tag() {
        let query = sent_zaps_query("me", Period::new(0, 10));
        assert!(query.matches(&event("a", "lnurl", 9735, 5, vec![vec!["P", "me"]])));
        assert!(!query.matches(&event("b", "lnurl", 9735, 5, vec![vec!["p", "me"]])));
    }

    #[test]
    fn topic_and_identifier_filters() {
        let query = EventQuery::new().topic("nostr-recap").identifier("x");
        assert!(query.matches(&event("a", "me", 30078, 0, vec![vec!["d", "x"], vec!["t", "nostr-recap"]])));
        assert!(!query.matches(&event("b", "me", 30078, 0, vec![vec!["d", "y"], vec!["t", "nostr-recap"]])));
        assert!(!query.matches(&event("c", "me", 30078, 0, vec![vec!["d", "x"]])));
    }

    #[tokio::test]
    async fn zero_relays_give_empty_sets() {
        let source = TrickleSource {
            own: Mutex::new(None),
        };
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::new(&recorder, Period::new(0, 100));

        let retrieved = retrieve(&source, "me", &[], Period::new(0, 100), &mut tracker).await;
        assert_eq!(retrieved, Retrieved::default());

        let phases: Vec<Phase> = recorder.0.lock().unwrap().iter().map(|u| u.phase).collect();
        assert_eq!(phases, vec![Phase::OwnEvents, Phase::IncomingEvents, Phase::SentZaps]);

        assert!(fetch_merged(&source, &[], &EventQuery::new()).await.is_empty());
    }

    #[tokio::test]
    async fn progress_advances_while_a_relay_streams() {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = TrickleSource {
            own: Mutex::new(Some(rx)),
        };
        let recorder = Recorder::default();
        let relays = vec!["wss://slow".to_string()];
        let period = Period::new(0, 100);

        let feed = async {
            tx.send(event("a", "me", 1, 50, vec![])).unwrap();
            // Halfway through the window maps to 5 + 0.5 * 40 while the
            // stream is still open.
            let seen = tokio::time::timeout(Duration::from_secs(5), async {
                while !recorder.reached(Phase::OwnEvents, 25) {
                    tokio::task::yield_now().await;
                }
            })
            .await;
            tx.send(event("b", "me", 1, 10, vec![])).unwrap();
            drop(tx);
            seen.is_ok()
        };
        let fetch = async {
            let mut tracker = ProgressTracker::new(&recorder, period);
            retrieve(&source, "me", &relays, period, &mut tracker).await
        };

        let (seen_mid_stream, retrieved) = tokio::join!(feed, fetch);
        assert!(seen_mid_stream);
        assert_eq!(retrieved.own.len(), 2);
        assert!(recorder.reached(Phase::OwnEvents, 41));
    }
}
