// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{RawRecord, RssRecord, SourceMeta, SourceProvider};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

// quick-xml matches child elements by local name: `content:encoded` arrives
// as `encoded`, `dc:date` as `date`, `atom:updated` as `updated`, and an
// `<atom:link rel="self"/>` lands next to the plain `<link>`.
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    description: Option<String>,
    #[serde(rename = "encoded")]
    content: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date")]
    dc_date: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "$text", default)]
    text: Option<String>,
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

impl Item {
    /// Text of the first `<link>`, else the href of an alternate `<atom:link>`.
    fn article_link(&self) -> Option<String> {
        fn non_empty(s: &Option<String>) -> Option<String> {
            s.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
        }
        self.links.iter().find_map(|l| non_empty(&l.text)).or_else(|| {
            self.links
                .iter()
                .filter(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .find_map(|l| non_empty(&l.href))
        })
    }
}

impl From<Item> for RssRecord {
    fn from(it: Item) -> Self {
        let link = it.article_link();
        RssRecord {
            title: it.title,
            link,
            description: it.description,
            content: it.content,
            published: it.pub_date.or(it.dc_date),
            updated: it.updated,
        }
    }
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 feed provider (fixture or HTTP).
pub struct RssProvider {
    meta: SourceMeta,
    mode: Mode,
}

impl RssProvider {
    pub fn from_fixture(meta: SourceMeta, xml: &str) -> Self {
        Self {
            meta,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(meta: SourceMeta, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            meta,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawRecord>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml for {}", self.meta.name))?;

        let out: Vec<RawRecord> = rss
            .channel
            .item
            .into_iter()
            .map(|it| RawRecord::Rss(it.into()))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        tracing::debug!(target: "ingest", source = %self.meta.name, items = out.len(), "rss parsed");
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("rss http get {url}"))?
                    .error_for_status()
                    .with_context(|| format!("rss http status {url}"))?
                    .text()
                    .await
                    .context("rss http .text()")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn meta(&self) -> &SourceMeta {
        &self.meta
    }
}

/// HTML entities that show up in real feeds but are not valid XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
