//! One stats computation: reconcile, retrieve, accumulate, rank.

use crate::config::Config;
use crate::progress::{Phase, ProgressSink, ProgressTracker};
use crate::reconcile::{fetch_population, fetch_profile, find_cached};
use crate::retrieval::{retrieve, EventSource};
use chrono::{FixedOffset, TimeZone};
use nostr_core::nostr_sdk::prelude::PublicKey;
use nostr_core::ProfileMetadata;
use recap_stats::{
    accumulate, rank_affinity, select_population, PercentileReport, Period, StatsSnapshot,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Invalid request parameters. Nothing is fetched when one of these is
/// returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no relays given")]
    NoRelays,
    #[error("window start {since} is not before its end {until}")]
    InvertedWindow { since: u64, until: u64 },
    #[error("not a valid npub or hex pubkey: {0}")]
    InvalidSubject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    /// Hex pubkey.
    pub subject: String,
    pub relays: Vec<String>,
    pub period: Period,
    /// Skip the published-snapshot lookup.
    pub force_refresh: bool,
}

impl StatsRequest {
    pub fn new(subject: impl Into<String>, relays: Vec<String>, period: Period) -> Self {
        Self {
            subject: subject.into(),
            relays,
            period,
            force_refresh: false,
        }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.relays.is_empty() {
            return Err(RequestError::NoRelays);
        }
        if self.period.since >= self.period.until {
            return Err(RequestError::InvertedWindow {
                since: self.period.since,
                until: self.period.until,
            });
        }
        parse_subject(&self.subject)?;
        Ok(())
    }
}

/// Accept an npub or hex pubkey, returning lowercase hex.
pub fn parse_subject(input: &str) -> Result<String, RequestError> {
    PublicKey::parse(input.trim())
        .map(|pk| pk.to_hex())
        .map_err(|_| RequestError::InvalidSubject(input.to_string()))
}

/// Calendar year at the given offset, as `[Jan 1, next Jan 1)`.
pub fn year_period(year: i32, offset_minutes: i32) -> Option<Period> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    let start = offset.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = offset.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()?;
    Some(Period::new(
        u64::try_from(start.timestamp()).ok()?,
        u64::try_from(end.timestamp()).ok()?,
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum SnapshotOrigin {
    Computed,
    /// Reused from a previously published record.
    Cached { event_id: String, created_at: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub profile: Option<ProfileMetadata>,
    pub snapshot: StatsSnapshot,
    pub percentiles: PercentileReport,
    pub origin: SnapshotOrigin,
}

/// Compute (or reuse) the snapshot for a request and rank it.
///
/// Relay failures degrade the result instead of failing it; only invalid
/// requests are errors.
pub async fn compute(
    source: &dyn EventSource,
    config: &Config,
    request: &StatsRequest,
    sink: &dyn ProgressSink,
) -> Result<StatsReport, RequestError> {
    request.validate()?;
    let subject = parse_subject(&request.subject)?;
    let relays = &request.relays;
    let period = request.period;

    let mut progress = ProgressTracker::new(sink, period);

    let main = async {
        progress.enter(Phase::Reconciling, "Looking for a published snapshot");
        let cached = if request.force_refresh {
            None
        } else {
            find_cached(source, relays, &subject, period).await
        };

        let (snapshot, origin) = match cached {
            Some(record) => {
                info!("Reusing published snapshot {}", record.event_id);
                (
                    StatsSnapshot::from_published(&subject, &record.snapshot),
                    SnapshotOrigin::Cached {
                        event_id: record.event_id,
                        created_at: record.created_at,
                    },
                )
            }
            None => {
                let retrieved = retrieve(source, &subject, relays, period, &mut progress).await;

                progress.enter(Phase::Aggregating, "Aggregating");
                let accumulated = accumulate(
                    &retrieved.own,
                    &retrieved.incoming,
                    &retrieved.sent_zaps,
                    &subject,
                    &config.stats,
                );
                let affinity = rank_affinity(
                    &accumulated.interactions,
                    config.stats.affinity_algorithm,
                    config.stats.affinity_limit,
                );
                (
                    StatsSnapshot::new(&subject, relays, period, accumulated.stats, affinity),
                    SnapshotOrigin::Computed,
                )
            }
        };

        progress.enter(Phase::Ranking, "Ranking against published snapshots");
        let records = fetch_population(source, relays, config.percentile.population_limit).await;
        let population = select_population(
            &subject,
            relays,
            &records,
            config.percentile.match_relays,
            config.percentile.match_period.then_some(period),
        );
        let percentiles = PercentileReport::compute(&snapshot.stats, &population);

        progress.finish("Done");
        (snapshot, origin, percentiles)
    };

    let (profile, (snapshot, origin, percentiles)) =
        tokio::join!(fetch_profile(source, relays, &subject), main);

    Ok(StatsReport {
        profile,
        snapshot,
        percentiles,
        origin,
    })
}
