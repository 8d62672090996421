// src/ingest/providers/scrape.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{ElementRef, Html, Selector};

use crate::ingest::config::SelectorConfig;
use crate::ingest::normalize_text;
use crate::ingest::types::{RawRecord, ScrapedRecord, SourceMeta, SourceProvider};

/// Compiled CSS selectors for one page layout.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    container: Selector,
    title: Selector,
    date: Selector,
    description: Selector,
    link: Selector,
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid {field} selector `{css}`: {e}"))
}

impl PageSelectors {
    pub fn from_config(cfg: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            container: compile("container", &cfg.container)?,
            title: compile("title", &cfg.title)?,
            date: compile("date", &cfg.date)?,
            description: compile("description", &cfg.description)?,
            link: compile("link", &cfg.link)?,
        })
    }
}

/// Headless-browser rendering endpoint (Browserless `/content` API).
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl BrowserRenderer {
    pub fn new(client: reqwest::Client, endpoint: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn content(&self, page_url: &str) -> Result<String> {
        let mut endpoint = format!("{}/content", self.endpoint);
        if let Some(token) = &self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        let body = serde_json::json!({ "url": page_url });
        let resp = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("browser render {page_url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "browser render {page_url} failed with {}: {message}",
                status.as_u16()
            ));
        }
        resp.text().await.context("browser render .text()")
    }
}

enum Mode {
    Fixture { html: String, rendered: bool },
    Http { url: String, client: reqwest::Client },
    Browser { url: String, renderer: BrowserRenderer },
}

/// Extracts one record per container element on an HTML page.
pub struct ScrapeProvider {
    meta: SourceMeta,
    selectors: PageSelectors,
    mode: Mode,
}

impl ScrapeProvider {
    pub fn from_fixture(meta: SourceMeta, selectors: PageSelectors, html: &str, rendered: bool) -> Self {
        Self {
            meta,
            selectors,
            mode: Mode::Fixture {
                html: html.to_string(),
                rendered,
            },
        }
    }

    pub fn from_url(
        meta: SourceMeta,
        selectors: PageSelectors,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            meta,
            selectors,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn rendered(
        meta: SourceMeta,
        selectors: PageSelectors,
        url: impl Into<String>,
        renderer: BrowserRenderer,
    ) -> Self {
        Self {
            meta,
            selectors,
            mode: Mode::Browser {
                url: url.into(),
                renderer,
            },
        }
    }

    // `Html` is !Send; it must not be held across an await.
    fn parse_page(&self, html: &str, rendered: bool) -> Vec<RawRecord> {
        let t0 = std::time::Instant::now();
        let doc = Html::parse_document(html);

        let out: Vec<RawRecord> = doc
            .select(&self.selectors.container)
            .map(|item| RawRecord::Scraped(self.extract(item, rendered)))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        tracing::debug!(target: "ingest", source = %self.meta.name, items = out.len(), rendered, "page scraped");
        out
    }

    fn extract(&self, item: ElementRef<'_>, rendered: bool) -> ScrapedRecord {
        let s = &self.selectors;
        let date_text = item.select(&s.date).next().map(|d| {
            // <time datetime="..."> beats the human-readable label
            d.value()
                .attr("datetime")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(d))
        });
        let link = item
            .select(&s.link)
            .find_map(|a| a.value().attr("href"))
            .or_else(|| item.value().attr("href"))
            .map(str::to_string);

        ScrapedRecord {
            title: item.select(&s.title).next().map(element_text),
            link,
            description: item.select(&s.description).next().map(element_text),
            date_text: date_text.filter(|t| !t.is_empty()),
            rendered,
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

#[async_trait]
impl SourceProvider for ScrapeProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture { html, rendered } => Ok(self.parse_page(html, *rendered)),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("scrape http get {url}"))?
                    .error_for_status()
                    .with_context(|| format!("scrape http status {url}"))?
                    .text()
                    .await
                    .context("scrape http .text()")?;
                Ok(self.parse_page(&body, false))
            }
            Mode::Browser { url, renderer } => {
                let body = renderer.content(url).await?;
                Ok(self.parse_page(&body, true))
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

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
      <div class="event-card">
        <h3 class="title">Toddler   Storytime</h3>
        <time datetime="2025-03-08">Sat, March 8</time>
        <p>Songs &amp; stories for ages 1-3.</p>
        <a href="/events/toddler-storytime">Details</a>
      </div>
      <div class="event-card">
        <p>No heading here</p>
      </div>
    </body></html>"#;

    fn selectors() -> PageSelectors {
        PageSelectors::from_config(&SelectorConfig {
            container: ".event-card".into(),
            title: "h2, h3, .title".into(),
            date: ".date, time".into(),
            description: "p, .summary".into(),
            link: "a".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn extracts_fields_per_container() {
        let meta = SourceMeta::new("CPL Events", "library");
        let p = ScrapeProvider::from_fixture(meta, selectors(), PAGE, true);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            RawRecord::Scraped(r) => {
                assert_eq!(r.title.as_deref(), Some("Toddler Storytime"));
                assert_eq!(r.date_text.as_deref(), Some("2025-03-08"));
                assert_eq!(r.description.as_deref(), Some("Songs & stories for ages 1-3."));
                assert_eq!(r.link.as_deref(), Some("/events/toddler-storytime"));
                assert!(r.rendered);
            }
            other => panic!("unexpected record {other:?}"),
        }
        match &items[1] {
            RawRecord::Scraped(r) => assert!(r.title.is_none()),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn bad_selector_is_reported() {
        let cfg = SelectorConfig {
            container: "div[".into(),
            title: "h2".into(),
            date: "time".into(),
            description: "p".into(),
            link: "a".into(),
        };
        let err = PageSelectors::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("container"));
    }
}
