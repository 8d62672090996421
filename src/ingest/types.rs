// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_PRIORITY;

/// Fetcher-declared metadata attached to every record of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub name: String,     // e.g., "Cleveland.com Family"
    pub category: String, // source-declared classification
    pub priority: i64,    // 1 = highest
    /// Origin used to resolve relative links, e.g. `https://cpl.org`.
    pub base_url: Option<String>,
}

impl SourceMeta {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            priority: DEFAULT_PRIORITY,
            base_url: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// One `<item>` of an RSS feed, as the feed declared it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

/// One container matched on a scraped page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub date_text: Option<String>,
    /// Page was rendered by a headless browser before extraction.
    pub rendered: bool,
}

/// Raw, heterogeneous records as produced by the fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawRecord {
    Rss(RssRecord),
    Scraped(ScrapedRecord),
}

impl RawRecord {
    pub fn is_rss(&self) -> bool {
        matches!(self, RawRecord::Rss(_))
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch whatever the source currently lists. A bad single item must not
    /// fail the call; an `Err` means the whole source is unavailable.
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &str;
    fn meta(&self) -> &SourceMeta;
}
