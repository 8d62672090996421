// src/ingest/normalize.rs
//! Maps raw fetcher records into the canonical `Article` and assigns identity.
//!
//! Everything here is pure: the caller passes `now`, so the same record and
//! the same clock reading always produce the same article.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use url::Url;

use crate::error::{PipelineError, Result};
use crate::ingest::normalize_text;
use crate::ingest::types::{RawRecord, SourceMeta};
use crate::model::{Article, OriginType};

/// Titles longer than this are cut before hashing/storage.
const TITLE_MAX_CHARS: usize = 500;

/// Stable identity: first 128 bits of SHA-256 over `"<url_or_source>|<title>"`, hex.
pub fn article_id(url_or_source: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url_or_source.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Resolve `link` against the source's declared origin.
/// Absolute links pass through; without a usable base the raw link is kept.
pub fn resolve_url(link: &str, base: Option<&str>) -> String {
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }
    if let Ok(abs) = Url::parse(link) {
        if abs.has_host() {
            return abs.to_string();
        }
    }
    base.and_then(|b| Url::parse(b.trim()).ok())
        .and_then(|b| b.join(link).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| link.to_string())
}

/// Best-effort timestamp parsing: RFC 2822, RFC 3339, then a few date-only shapes
/// commonly found on event pages.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ts = raw.trim();
    if ts.is_empty() {
        return None;
    }

    let offset = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok();
    if let Some(dt) = offset {
        return DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }

    for fmt in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(ts, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
        }
    }
    None
}

/// Fields common to both record shapes after extraction.
struct Extracted<'a> {
    title: Option<&'a str>,
    link: Option<&'a str>,
    description: Option<&'a str>,
    content: Option<&'a str>,
    timestamps: [Option<&'a str>; 2],
    origin: OriginType,
}

fn extract(raw: &RawRecord) -> Extracted<'_> {
    match raw {
        RawRecord::Rss(r) => Extracted {
            title: r.title.as_deref(),
            link: r.link.as_deref(),
            description: r.description.as_deref(),
            content: r.content.as_deref(),
            timestamps: [r.published.as_deref(), r.updated.as_deref()],
            origin: OriginType::Rss,
        },
        RawRecord::Scraped(s) => Extracted {
            title: s.title.as_deref(),
            link: s.link.as_deref(),
            description: s.description.as_deref(),
            content: None,
            timestamps: [s.date_text.as_deref(), None],
            origin: if s.rendered {
                OriginType::BrowserScraped
            } else {
                OriginType::Scraped
            },
        },
    }
}

/// Normalize one raw record. Fails with `SkippedRecord` when no usable title exists.
pub fn normalize(raw: &RawRecord, meta: &SourceMeta, now: DateTime<Utc>) -> Result<Article> {
    let x = extract(raw);

    let title: String = normalize_text(x.title.unwrap_or_default())
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect();
    if title.is_empty() {
        return Err(PipelineError::skipped(&meta.name, "missing title"));
    }

    let url = resolve_url(x.link.unwrap_or_default(), meta.base_url.as_deref());
    let identity_key = if url.is_empty() { meta.name.as_str() } else { url.as_str() };
    let id = article_id(identity_key, &title);

    // published → updated → collection time
    let published_at = x
        .timestamps
        .iter()
        .flatten()
        .find_map(|ts| parse_timestamp(ts))
        .unwrap_or(now);

    Ok(Article {
        id,
        title,
        url,
        description: normalize_text(x.description.unwrap_or_default()),
        content: normalize_text(x.content.unwrap_or_default()),
        source: meta.name.clone(),
        category: meta.category.clone(),
        priority: meta.priority,
        published_at,
        collected_at: now,
        origin_type: x.origin,
        filter_score: None,
        filter_category: None,
        relevance_level: None,
        matched_keywords: BTreeSet::new(),
        is_processed: false,
        is_sent: false,
        created_at: None,
    })
}
