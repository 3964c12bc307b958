//! Percentile ranking of one snapshot against a population of published
//! snapshots.
//!
//! Lower is better: 0 means the subject beats every population member on
//! that metric, 100 means nobody in the population is below them.

use crate::event::SnapshotRecord;
use crate::types::{same_relay_set, ActivityStats, Period};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// `round(100 - below / n * 100)` where `below` counts population values
/// strictly less than `mine`. An empty population yields 0.
pub fn percentile(mine: u64, population: &[u64]) -> u8 {
    if population.is_empty() {
        return 0;
    }
    let mut sorted = population.to_vec();
    sorted.sort_unstable();
    let below = sorted.partition_point(|&v| v < mine);
    let pct = 100.0 - below as f64 / sorted.len() as f64 * 100.0;
    pct.round().clamp(0.0, 100.0) as u8
}

/// Metrics that are ranked against the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Kind1Count,
    Kind1Chars,
    Kind30023Count,
    Kind6Count,
    Kind7Count,
    Kind42Count,
    ImageCount,
    TopPostReactions,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Kind1Count,
        Metric::Kind1Chars,
        Metric::Kind30023Count,
        Metric::Kind6Count,
        Metric::Kind7Count,
        Metric::Kind42Count,
        Metric::ImageCount,
        Metric::TopPostReactions,
    ];

    pub fn value(self, stats: &ActivityStats) -> u64 {
        match self {
            Metric::Kind1Count => stats.kind1_count,
            Metric::Kind1Chars => stats.kind1_chars,
            Metric::Kind30023Count => stats.kind30023_count,
            Metric::Kind6Count => stats.kind6_count,
            Metric::Kind7Count => stats.kind7_count,
            Metric::Kind42Count => stats.kind42_count,
            Metric::ImageCount => stats.image_count,
            Metric::TopPostReactions => stats.top_post_reactions(),
        }
    }
}

/// Per-metric percentiles for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileReport {
    pub population_size: usize,
    pub ranks: BTreeMap<Metric, u8>,
}

impl PercentileReport {
    /// Rank `stats` on every metric against `population`.
    pub fn compute(stats: &ActivityStats, population: &[&SnapshotRecord]) -> Self {
        let ranks = Metric::ALL
            .iter()
            .map(|&metric| {
                let values: Vec<u64> = population
                    .iter()
                    .map(|record| metric.value(&record.snapshot.stats))
                    .collect();
                (metric, percentile(metric.value(stats), &values))
            })
            .collect();

        Self {
            population_size: population.len(),
            ranks,
        }
    }

    pub fn get(&self, metric: Metric) -> Option<u8> {
        self.ranks.get(&metric).copied()
    }
}

/// Narrow published records to a comparable population: current schema
/// version only, the subject excluded, one record per author (newest
/// wins) and, when `match_relays` is set, the same relay set. With a
/// `window`, only snapshots over exactly that window are kept.
pub fn select_population<'a>(
    subject: &str,
    relays: &[String],
    records: &'a [SnapshotRecord],
    match_relays: bool,
    window: Option<Period>,
) -> Vec<&'a SnapshotRecord> {
    let mut newest: HashMap<&str, &'a SnapshotRecord> = HashMap::new();

    for record in records {
        if !record.snapshot.is_current() || record.author == subject {
            continue;
        }
        if match_relays && !same_relay_set(&record.snapshot.relays, relays) {
            continue;
        }
        if window.is_some_and(|w| w != record.snapshot.period) {
            continue;
        }
        match newest.get(record.author.as_str()) {
            Some(existing) if existing.created_at >= record.created_at => {}
            _ => {
                newest.insert(record.author.as_str(), record);
            }
        }
    }

    let mut population: Vec<&SnapshotRecord> = newest.into_values().collect();
    population.sort_by(|a, b| a.author.cmp(&b.author));
    log::debug!(
        "population of {} from {} published records",
        population.len(),
        records.len()
    );
    population
}
