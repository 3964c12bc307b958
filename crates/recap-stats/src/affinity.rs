//! Affinity ranking over directional interaction counts.

use crate::accumulate::InteractionCounts;
use crate::config::AffinityAlgorithm;
use crate::types::AffinityEntry;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Mutuality of an interaction pair: `1 - |sent - received| / (sent + received)`.
///
/// 1.0 for a perfectly even exchange, 0.0 for one-way traffic or none.
pub fn balance(sent: u64, received: u64) -> f64 {
    let total = sent + received;
    if total == 0 {
        return 0.0;
    }
    1.0 - sent.abs_diff(received) as f64 / total as f64
}

fn weighted_score(c: &InteractionCounts) -> u64 {
    c.reactions_sent + 2 * c.replies_sent + c.reactions_received + 2 * c.replies_received
}

fn entry(pubkey: &str, c: &InteractionCounts) -> AffinityEntry {
    AffinityEntry {
        pubkey: pubkey.to_string(),
        reactions_sent: c.reactions_sent,
        replies_sent: c.replies_sent,
        reactions_received: c.reactions_received,
        replies_received: c.replies_received,
        balance: balance(c.total_sent(), c.total_received()),
        weighted_score: weighted_score(c),
    }
}

/// Rank identities the subject has reacted to at least once.
///
/// Sorting is stable over the map's pubkey order, so equal keys stay in
/// ascending pubkey order.
pub fn rank_affinity(
    interactions: &BTreeMap<String, InteractionCounts>,
    algorithm: AffinityAlgorithm,
    limit: usize,
) -> Vec<AffinityEntry> {
    let mut entries: Vec<AffinityEntry> = interactions
        .iter()
        .filter(|(_, c)| c.reactions_sent > 0)
        .map(|(pubkey, c)| entry(pubkey, c))
        .collect();

    match algorithm {
        AffinityAlgorithm::PrimaryBalance => entries.sort_by(|a, b| {
            b.reactions_sent.cmp(&a.reactions_sent).then_with(|| {
                b.balance
                    .partial_cmp(&a.balance)
                    .unwrap_or(Ordering::Equal)
            })
        }),
        AffinityAlgorithm::WeightedSum => {
            entries.sort_by(|a, b| b.weighted_score.cmp(&a.weighted_score))
        }
    }

    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(rs: u64, rps: u64, rr: u64, rpr: u64) -> InteractionCounts {
        InteractionCounts {
            reactions_sent: rs,
            replies_sent: rps,
            reactions_received: rr,
            replies_received: rpr,
        }
    }

    #[test]
    fn balance_bounds() {
        assert_eq!(balance(5, 5), 1.0);
        assert_eq!(balance(10, 0), 0.0);
        assert_eq!(balance(0, 0), 0.0);
        assert!((balance(3, 1) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn requires_a_sent_reaction() {
        let mut map = BTreeMap::new();
        map.insert("fan".to_string(), counts(0, 0, 0, 100));
        map.insert("friend".to_string(), counts(1, 0, 0, 0));

        for algorithm in [AffinityAlgorithm::PrimaryBalance, AffinityAlgorithm::WeightedSum] {
            let ranked = rank_affinity(&map, algorithm, 10);
            assert_eq!(ranked.len(), 1);
            assert_eq!(ranked[0].pubkey, "friend");
        }
    }

    #[test]
    fn primary_balance_orders_by_reactions_then_mutuality() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), counts(5, 0, 0, 0));
        map.insert("b".to_string(), counts(5, 0, 5, 0));
        map.insert("c".to_string(), counts(9, 0, 0, 0));

        let ranked = rank_affinity(&map, AffinityAlgorithm::PrimaryBalance, 10);
        let order: Vec<&str> = ranked.iter().map(|e| e.pubkey.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert_eq!(ranked[1].balance, 1.0);
    }

    #[test]
    fn weighted_sum_doubles_replies() {
        let mut map = BTreeMap::new();
        map.insert("reactor".to_string(), counts(4, 0, 0, 0));
        map.insert("replier".to_string(), counts(1, 1, 0, 1));

        let ranked = rank_affinity(&map, AffinityAlgorithm::WeightedSum, 10);
        assert_eq!(ranked[0].pubkey, "replier");
        assert_eq!(ranked[0].weighted_score, 5);
        assert_eq!(ranked[1].weighted_score, 4);
    }

    #[test]
    fn ties_keep_pubkey_order() {
        let mut map = BTreeMap::new();
        map.insert("zed".to_string(), counts(2, 0, 0, 0));
        map.insert("amy".to_string(), counts(2, 0, 0, 0));

        let ranked = rank_affinity(&map, AffinityAlgorithm::PrimaryBalance, 10);
        assert_eq!(ranked[0].pubkey, "amy");
        assert_eq!(ranked[1].pubkey, "zed");
    }

    #[test]
    fn truncates_to_limit() {
        let map: BTreeMap<String, InteractionCounts> = (0..25)
            .map(|i| (format!("pk{i:02}"), counts(i + 1, 0, 0, 0)))
            .collect();
        let ranked = rank_affinity(&map, AffinityAlgorithm::PrimaryBalance, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].reactions_sent, 25);
        assert_eq!(ranked[9].reactions_sent, 16);
    }
}
