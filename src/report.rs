//! Window resolution and terminal output for the CLI.

use crate::engine::{year_period, SnapshotOrigin, StatsReport};
use crate::publish::PublishOutcome;
use crate::reconcile::RecentRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use recap_stats::{Metric, Period};

/// Resolve `--since/--until/--year` into a window.
///
/// Bounds are unix seconds or `YYYY-MM-DD` (midnight at the activity
/// offset). With no arguments the current year is used.
pub fn resolve_period(
    since: Option<&str>,
    until: Option<&str>,
    year: Option<i32>,
    offset_minutes: i32,
) -> Result<Period> {
    let offset = FixedOffset::east_opt(offset_minutes * 60).context("Invalid activity offset")?;

    match (since, until, year) {
        (None, None, year) => {
            let year = year.unwrap_or_else(|| Utc::now().with_timezone(&offset).year());
            year_period(year, offset_minutes).with_context(|| format!("Invalid year: {year}"))
        }
        (since, until, None) => {
            let since = match since {
                Some(s) => parse_bound(s, &offset)?,
                None => 0,
            };
            let until = match until {
                Some(u) => parse_bound(u, &offset)?,
                None => u64::try_from(Utc::now().timestamp()).unwrap_or(0),
            };
            Ok(Period::new(since, until))
        }
        _ => anyhow::bail!("--year cannot be combined with --since/--until"),
    }
}

fn parse_bound(value: &str, offset: &FixedOffset) -> Result<u64> {
    if let Ok(ts) = value.parse::<u64>() {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}', expected unix seconds or YYYY-MM-DD"))?;
    let midnight = date.and_hms_opt(0, 0, 0).context("Invalid date")?;
    let local = offset
        .from_local_datetime(&midnight)
        .single()
        .context("Ambiguous local date")?;
    u64::try_from(local.timestamp()).context("Date before 1970")
}

fn fmt_date(ts: u64, offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.with_timezone(&offset).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn metric_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Kind1Count => "Posts",
        Metric::Kind1Chars => "Characters",
        Metric::Kind30023Count => "Articles",
        Metric::Kind6Count => "Reposts",
        Metric::Kind7Count => "Reactions",
        Metric::Kind42Count => "Chat messages",
        Metric::ImageCount => "Images",
        Metric::TopPostReactions => "Top post reactions",
    }
}

fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}…", flat.chars().take(max).collect::<String>())
    }
}

/// Format and print a report to stdout.
pub fn print_report(report: &StatsReport, offset_minutes: i32) {
    let snapshot = &report.snapshot;
    let stats = &snapshot.stats;
    let name = report
        .profile
        .as_ref()
        .and_then(|p| p.best_name())
        .unwrap_or(&snapshot.subject);

    println!(
        "Nostr Recap: {name} ({} to {})",
        fmt_date(snapshot.period.since, offset_minutes),
        fmt_date(snapshot.period.until.saturating_sub(1), offset_minutes)
    );
    if let SnapshotOrigin::Cached { event_id, .. } = &report.origin {
        println!("(from published snapshot {event_id})");
    }
    println!();

    println!(
        "Posts: {} ({} chars, {} replies, {} images)",
        fmt_num(stats.kind1_count),
        fmt_num(stats.kind1_chars),
        fmt_num(stats.reply_count),
        fmt_num(stats.image_count)
    );
    println!(
        "Articles: {} ({} chars)",
        fmt_num(stats.kind30023_count),
        fmt_num(stats.kind30023_chars)
    );
    println!(
        "Reposts: {}    Reactions: {}    Chat: {}",
        fmt_num(stats.kind6_count),
        fmt_num(stats.kind7_count),
        fmt_num(stats.kind42_count)
    );
    println!(
        "Received: {} reactions, {} replies",
        fmt_num(stats.reactions_received),
        fmt_num(stats.replies_received)
    );
    println!(
        "Zaps sent: {} ({} sats, avg {})    received: {} ({} sats, avg {})",
        fmt_num(stats.zaps_sent.count),
        fmt_num(stats.zaps_sent.total_sats),
        fmt_num(stats.zaps_sent.average_sats),
        fmt_num(stats.zaps_received.count),
        fmt_num(stats.zaps_received.total_sats),
        fmt_num(stats.zaps_received.average_sats)
    );
    println!();

    if !stats.top_posts.is_empty() {
        println!("Top posts:");
        for post in &stats.top_posts {
            println!("  {:>5}  {}", post.reaction_count, preview(&post.content, 60));
        }
        println!();
    }

    if !stats.top_reactions.is_empty() {
        let glyphs: Vec<String> = stats
            .top_reactions
            .iter()
            .map(|r| format!("{} {}", r.glyph, r.count))
            .collect();
        println!("Reactions used: {}", glyphs.join("  "));
        println!();
    }

    if !stats.monthly_activity.is_empty() {
        println!("Monthly activity:");
        let peak = stats.monthly_activity.values().copied().max().unwrap_or(0);
        for (month, count) in &stats.monthly_activity {
            println!("  {month}  {:>6}  {}", fmt_num(*count), bar(*count, peak, 30));
        }
        println!();

        println!("Hourly activity:");
        let peak = stats.hourly_activity.iter().copied().max().unwrap_or(0);
        for (hour, count) in stats.hourly_activity.iter().enumerate() {
            println!("  {hour:02}h  {:>6}  {}", fmt_num(*count), bar(*count, peak, 30));
        }
        println!();
    }

    if !snapshot.affinity.is_empty() {
        println!("Closest contacts:");
        for entry in &snapshot.affinity {
            println!(
                "  {}  sent {:>4}  received {:>4}  balance {:.2}",
                entry.pubkey,
                entry.reactions_sent + entry.replies_sent,
                entry.reactions_received + entry.replies_received,
                entry.balance
            );
        }
        println!();
    }

    if report.percentiles.population_size > 0 {
        println!(
            "Standing among {} published recaps (top %):",
            report.percentiles.population_size
        );
        for (metric, rank) in &report.percentiles.ranks {
            println!("  {:<20} {:>3}%", metric_label(*metric), rank);
        }
    } else {
        println!("No published recaps to compare against.");
    }
}

/// Print a report as JSON.
pub fn print_report_json(report: &StatsReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub fn print_publish_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::ReadOnly => println!("No signing key configured; snapshot not published."),
        PublishOutcome::Published {
            event_id,
            accepted,
            rejected,
        } => {
            println!(
                "Published {event_id} to {}/{} relay(s)",
                accepted.len(),
                accepted.len() + rejected.len()
            );
            for relay in rejected {
                println!("  rejected: {relay}");
            }
        }
    }
}

pub fn print_recent(records: &[RecentRecord], offset_minutes: i32) {
    if records.is_empty() {
        println!("No published recaps found.");
        return;
    }
    for record in records {
        println!(
            "{}  {}  {} to {}  {:>6} posts{}",
            fmt_date(record.created_at, offset_minutes),
            record.author,
            fmt_date(record.period.since, offset_minutes),
            fmt_date(record.period.until.saturating_sub(1), offset_minutes),
            fmt_num(record.kind1_count),
            if record.compatible { "" } else { "  (older format)" }
        );
    }
}

fn bar(value: u64, peak: u64, width: u64) -> String {
    if peak == 0 {
        return String::new();
    }
    let len = (value * width).div_ceil(peak);
    "#".repeat(len as usize)
}

fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_formats_thousands() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(123), "123");
        assert_eq!(fmt_num(1234), "1,234");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn explicit_year() {
        let period = resolve_period(None, None, Some(2024), 540).unwrap();
        assert_eq!(period, Period::new(1_704_034_800, 1_735_657_200));
    }

    #[test]
    fn dates_resolve_at_offset() {
        let period = resolve_period(Some("2024-01-01"), Some("2024-02-01"), None, 540).unwrap();
        assert_eq!(period.since, 1_704_034_800);
        assert_eq!(period.until, 1_704_034_800 + 31 * 86_400);
    }

    #[test]
    fn unix_seconds_pass_through() {
        let period = resolve_period(Some("100"), Some("200"), None, 0).unwrap();
        assert_eq!(period, Period::new(100, 200));
    }

    #[test]
    fn year_conflicts_with_bounds() {
        assert!(resolve_period(Some("100"), None, Some(2024), 0).is_err());
        assert!(resolve_period(Some("yesterday"), None, None, 0).is_err());
    }

    #[test]
    fn bars_scale_to_peak() {
        assert_eq!(bar(0, 0, 10), "");
        assert_eq!(bar(10, 10, 10), "##########");
        assert_eq!(bar(1, 10, 10), "#");
        assert_eq!(bar(0, 10, 10), "");
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\nb", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc…");
    }
}
