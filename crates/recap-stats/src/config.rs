//! Configuration for snapshot aggregation.

use serde::{Deserialize, Serialize};

/// How the affinity ranking orders eligible identities.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AffinityAlgorithm {
    /// Reactions sent descending, then balance descending.
    #[default]
    PrimaryBalance,
    /// `reactionsSent + 2*repliesSent + reactionsReceived + 2*repliesReceived`
    /// descending.
    WeightedSum,
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsConfig {
    /// Fixed offset used for month and hour buckets, independent of the
    /// host timezone. Defaults to UTC+9.
    #[serde(default = "default_timezone_offset")]
    pub activity_timezone_offset_minutes: i32,
    #[serde(default)]
    pub affinity_algorithm: AffinityAlgorithm,
    /// Number of most-reacted posts kept.
    #[serde(default = "default_top_posts")]
    pub top_posts: usize,
    /// Number of reaction glyphs kept.
    #[serde(default = "default_top_reactions")]
    pub top_reactions: usize,
    /// Length of the affinity ranking.
    #[serde(default = "default_affinity_limit")]
    pub affinity_limit: usize,
}

fn default_timezone_offset() -> i32 {
    540
}

fn default_top_posts() -> usize {
    3
}

fn default_top_reactions() -> usize {
    10
}

fn default_affinity_limit() -> usize {
    10
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            activity_timezone_offset_minutes: default_timezone_offset(),
            affinity_algorithm: AffinityAlgorithm::default(),
            top_posts: default_top_posts(),
            top_reactions: default_top_reactions(),
            affinity_limit: default_affinity_limit(),
        }
    }
}
