use recap_stats::*;
use recap_stats::publish::SignedEvent;

const ME: &str = "subject";

fn ev(id: &str, pubkey: &str, kind: u16, created_at: u64, tags: Vec<Vec<&str>>, content: &str) -> RawEvent {
    RawEvent {
        id: id.into(),
        pubkey: pubkey.into(),
        kind,
        created_at,
        tags: tags
            .into_iter()
            .map(|t| t.into_iter().map(String::from).collect())
            .collect(),
        content: content.into(),
    }
}

fn sign(unsigned: UnsignedEvent) -> SignedEvent {
    SignedEvent {
        id: unsigned.compute_id(),
        pubkey: unsigned.pubkey,
        created_at: unsigned.created_at,
        kind: unsigned.kind,
        tags: unsigned.tags,
        content: unsigned.content,
        sig: "00".repeat(64),
    }
}

#[test]
fn test_full_pipeline() {
    let config = StatsConfig::default();
    let relays = vec!["wss://nos.lol".to_string(), "wss://relay.damus.io".to_string()];
    let period = Period::new(1_704_034_800, 1_735_657_200);

    // Subject posts, replies to alice, reacts to alice and bob
    let own = vec![
        ev("p1", ME, 1, 1_710_000_000, vec![], "gm https://image.nostr.build/a.png"),
        ev("p2", ME, 1, 1_710_003_600, vec![vec!["e", "x"], vec!["p", "alice"]], "agreed"),
        ev("r1", ME, 7, 1_710_007_200, vec![vec!["e", "a1"], vec!["p", "alice"]], "🤙"),
        ev("r2", ME, 7, 1_710_007_300, vec![vec!["e", "a2"], vec!["p", "alice"]], "🤙"),
        ev("r3", ME, 7, 1_710_007_400, vec![vec!["e", "b1"], vec!["p", "bob"]], ""),
        ev("z1", ME, 9734, 1_710_008_000, vec![vec!["p", "bob"], vec!["amount", "21000"]], ""),
    ];
    // Duplicate delivery of p1's reaction must not double-count
    let incoming = vec![
        ev("i1", "alice", 7, 1_710_010_000, vec![vec!["e", "p1"], vec!["p", ME]], "+"),
        ev("i1", "alice", 7, 1_710_010_000, vec![vec!["e", "p1"], vec!["p", ME]], "+"),
        ev("i2", "alice", 1, 1_710_011_000, vec![vec!["e", "p2"], vec!["p", ME]], "yes"),
        ev("i3", "bob", 7, 1_710_012_000, vec![vec!["e", "p2"], vec!["p", ME]], "+"),
        ev("i4", "carol", 1, 1_710_013_000, vec![vec!["e", "p1"], vec!["p", ME]], "who?"),
    ];

    let acc = accumulate(&own, &incoming, &[], ME, &config);
    let stats = &acc.stats;
    assert_eq!(stats.kind1_count, 2);
    assert_eq!(stats.kind1_chars, 2 + 6);
    assert_eq!(stats.image_count, 1);
    assert_eq!(stats.reply_count, 1);
    assert_eq!(stats.kind7_count, 3);
    assert_eq!(stats.reactions_received, 2);
    assert_eq!(stats.replies_received, 2);
    assert_eq!(stats.zaps_sent.total_sats, 21);
    assert_eq!(stats.top_reactions[0].glyph, "🤙");
    assert_eq!(stats.top_posts.len(), 2);
    assert_eq!(stats.monthly_activity.values().sum::<u64>(), 5);

    // carol only replied; she is never ranked
    let affinity = rank_affinity(&acc.interactions, config.affinity_algorithm, config.affinity_limit);
    let ranked: Vec<&str> = affinity.iter().map(|e| e.pubkey.as_str()).collect();
    assert_eq!(ranked, vec!["alice", "bob"]);
    assert_eq!(affinity[0].reactions_sent, 2);
    assert_eq!(affinity[0].replies_sent, 1);
    assert_eq!(affinity[0].balance, 1.0 - 1.0 / 5.0);

    // Publish, decode, and rank against peers
    let snapshot = StatsSnapshot::new(ME, &relays, period, acc.stats.clone(), affinity);
    let mine = sign(build_snapshot_event(&snapshot, 1_735_700_000).unwrap()).into_raw();
    let record = snapshot_from_event(&mine).unwrap();
    assert_eq!(record.snapshot.stats, snapshot.stats);

    let peers: Vec<SnapshotRecord> = [("p", 1u64), ("q", 5), ("r", 9)]
        .iter()
        .map(|(author, posts)| {
            let peer = StatsSnapshot::new(
                author,
                &relays,
                period,
                ActivityStats { kind1_count: *posts, ..Default::default() },
                Vec::new(),
            );
            let raw = sign(build_snapshot_event(&peer, 1_735_700_000).unwrap()).into_raw();
            snapshot_from_event(&raw).unwrap()
        })
        .chain(std::iter::once(record))
        .collect();

    let population = select_population(ME, &relays, &peers, true, None);
    assert_eq!(population.len(), 3);
    let report = PercentileReport::compute(&snapshot.stats, &population);
    // one of three peers below 2 posts
    assert_eq!(report.get(Metric::Kind1Count), Some(67));
}

#[test]
fn test_stats_config_from_toml() {
    let config: StatsConfig = toml::from_str(
        r#"
        activity_timezone_offset_minutes = 0
        affinity_algorithm = "weighted_sum"
        "#,
    )
    .unwrap();
    assert_eq!(config.affinity_algorithm, AffinityAlgorithm::WeightedSum);
    assert_eq!(config.top_posts, 3);

    let own = vec![ev("p", ME, 1, 1_704_036_600, vec![], "hi")];
    let acc = accumulate(&own, &[], &[], ME, &config);
    assert_eq!(acc.stats.monthly_activity.get("2023-12"), Some(&1));
}
