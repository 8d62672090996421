// src/ingest/providers/mod.rs
pub mod rss;
pub mod scrape;

pub use rss::RssProvider;
pub use scrape::{BrowserRenderer, PageSelectors, ScrapeProvider};

use crate::error::{PipelineError, Result};
use crate::ingest::config::{PipelineConfig, RenderMode};
use crate::ingest::types::{SourceMeta, SourceProvider};

pub const USER_AGENT: &str = concat!("family-news-pipeline/", env!("CARGO_PKG_VERSION"));

/// Optional token appended to browser render requests.
pub const ENV_BROWSER_TOKEN: &str = "BROWSERLESS_TOKEN";

/// Build every enabled provider, in configured order (feeds first, then scrapers).
pub fn from_config(cfg: &PipelineConfig) -> Result<Vec<Box<dyn SourceProvider>>> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(cfg.rate_limiting.timeout())
        .build()
        .map_err(|e| PipelineError::Configuration(format!("http client: {e}")))?;

    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();

    for f in cfg.rss_feeds.iter().filter(|f| f.enabled) {
        let meta = SourceMeta::new(&f.name, &f.category)
            .with_priority(f.priority)
            .with_base_url(&f.url);
        out.push(Box::new(RssProvider::from_url(meta, &f.url, client.clone())));
    }

    for s in cfg.scrapers.iter().filter(|s| s.enabled) {
        let selectors = PageSelectors::from_config(&s.selectors)
            .map_err(|e| PipelineError::Configuration(format!("scraper `{}`: {e}", s.name)))?;
        let meta = SourceMeta::new(&s.name, &s.category)
            .with_priority(s.priority)
            .with_base_url(s.base_url.as_deref().unwrap_or(&s.url));

        let provider = match s.render {
            RenderMode::Static => ScrapeProvider::from_url(meta, selectors, &s.url, client.clone()),
            RenderMode::Browser => {
                let endpoint = cfg.browser_endpoint.as_deref().ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "scraper `{}` needs browser rendering but browser_endpoint is unset",
                        s.name
                    ))
                })?;
                let token = std::env::var(ENV_BROWSER_TOKEN).ok();
                let renderer = BrowserRenderer::new(client.clone(), endpoint, token);
                ScrapeProvider::rendered(meta, selectors, &s.url, renderer)
            }
        };
        out.push(Box::new(provider));
    }

    tracing::info!(target: "ingest", providers = out.len(), "providers configured");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::config::parse_config;

    const CFG: &str = r#"
[keywords]
high_priority = ["school"]

[[rss_feeds]]
name = "On"
url = "https://on.test/rss"

[[rss_feeds]]
name = "Off"
url = "https://off.test/rss"
enabled = false

[[scrapers]]
name = "Events"
url = "https://events.test/list"
selectors = { container = ".card" }
"#;

    #[test]
    fn skips_disabled_and_keeps_order() {
        let cfg = parse_config(CFG, "toml").unwrap();
        let ps = from_config(&cfg).unwrap();
        let names: Vec<&str> = ps.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["On", "Events"]);
        assert_eq!(ps[1].meta().base_url.as_deref(), Some("https://events.test/list"));
    }

    #[test]
    fn browser_scraper_without_endpoint_is_configuration_error() {
        let s = format!("{CFG}render = \"browser\"\n");
        let cfg = parse_config(&s, "toml").unwrap();
        assert!(matches!(
            from_config(&cfg),
            Err(PipelineError::Configuration(_))
        ));
    }
}
