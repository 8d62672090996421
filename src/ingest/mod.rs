// src/ingest/mod.rs
pub mod collector;
pub mod config;
pub mod normalize;
pub mod providers;
pub mod types;

use crate::model::Article;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

pub use collector::{Collector, RunReport};
pub use normalize::{article_id, normalize, parse_timestamp, resolve_url};

/// Body text longer than this is cut.
pub const TEXT_MAX_CHARS: usize = 5_000;

/// One-time metrics registration (so series show up in the exposition output).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Raw records parsed from providers.");
        describe_counter!(
            "ingest_kept_total",
            "Articles kept after scoring (relevance above none)."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Articles dropped because they scored relevance none."
        );
        describe_counter!("ingest_dedup_total", "Duplicate identities within a run.");
        describe_counter!(
            "ingest_skipped_total",
            "Records skipped by the normalizer (no usable title)."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors and timeouts."
        );
        describe_counter!("ingest_stored_total", "Articles upserted into the store.");
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the collection pipeline last ran."
        );
    });
}

/// Normalize text: decode entities, strip tags, fold quotes and whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > TEXT_MAX_CHARS {
        out = out.chars().take(TEXT_MAX_CHARS).collect();
    }

    out
}

/// Keep the first article per identity, preserving order.
/// Returns (unique, duplicates_dropped).
pub fn dedup_by_id(articles: Vec<Article>) -> (Vec<Article>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(articles.len());
    let mut keep = Vec::with_capacity(articles.len());
    let mut dup = 0usize;
    for a in articles {
        if !seen.insert(a.id.clone()) {
            dup += 1;
            continue;
        }
        keep.push(a);
    }
    (keep, dup)
}
