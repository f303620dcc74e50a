//! Linking statistics.
//!
//! Tracks how many links were created, per document and per target, a
//! bounded history of linking events, and a per-session summary. Persisted
//! alongside the incremental checkpoint by [`state`](crate::state) and
//! printed by `autolink stats`.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oldest events are evicted once the history holds this many.
pub const HISTORY_LIMIT: usize = 1000;

/// One document rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEvent {
    pub timestamp: DateTime<Utc>,
    pub document: String,
    pub targets: Vec<String>,
    pub links: usize,
}

/// Counters for the current process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub documents_processed: usize,
    pub links_created: usize,
    pub time_spent_ms: u64,
    pub average_links_per_document: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkStats {
    pub total_links_created: usize,
    #[serde(default)]
    pub links_per_document: BTreeMap<String, usize>,
    #[serde(default)]
    pub links_per_target: BTreeMap<String, usize>,
    #[serde(default)]
    pub history: VecDeque<LinkEvent>,
    #[serde(default)]
    pub session: SessionStats,
}

impl LinkStats {
    /// Record one processed document. Documents that gained no links only
    /// count toward the session.
    pub fn record(&mut self, document: &str, targets: &[String], links: usize, elapsed: Duration) {
        let s = &mut self.session;
        s.documents_processed += 1;
        s.links_created += links;
        s.time_spent_ms += elapsed.as_millis() as u64;
        s.average_links_per_document = s.links_created as f64 / s.documents_processed as f64;

        if links == 0 {
            return;
        }

        self.total_links_created += links;
        *self
            .links_per_document
            .entry(document.to_string())
            .or_insert(0) += links;
        for target in targets {
            *self.links_per_target.entry(target.clone()).or_insert(0) += 1;
        }

        self.history.push_back(LinkEvent {
            timestamp: Utc::now(),
            document: document.to_string(),
            targets: targets.to_vec(),
            links,
        });
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Start a fresh session; lifetime totals are kept.
    pub fn reset_session(&mut self) {
        self.session = SessionStats::default();
    }

    /// The `n` targets linked from the most documents, ties broken by name.
    pub fn most_linked(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .links_per_target
            .iter()
            .map(|(t, c)| (t.clone(), *c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Print a summary of `stats` to stdout.
pub fn print_stats(stats: &LinkStats, last_run: Option<DateTime<Utc>>) {
    println!("Autolink Stats");
    println!("==============");
    println!();
    println!(
        "  Last run:        {}",
        match last_run {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    println!("  Links created:   {}", stats.total_links_created);
    println!("  Documents:       {}", stats.links_per_document.len());
    println!("  Targets:         {}", stats.links_per_target.len());

    let top = stats.most_linked(10);
    if !top.is_empty() {
        println!();
        println!("  Most linked:");
        println!("  {:<40} {:>8}", "TARGET", "DOCS");
        println!("  {}", "-".repeat(50));
        for (target, count) in &top {
            println!("  {:<40} {:>8}", target, count);
        }
    }

    if !stats.history.is_empty() {
        println!();
        println!("  Recent:");
        for event in stats.history.iter().rev().take(5) {
            println!(
                "  {:<16} {:<32} +{}",
                format_ts_relative(event.timestamp),
                event.document,
                event.links
            );
        }
    }

    println!();
}

/// Format a timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
