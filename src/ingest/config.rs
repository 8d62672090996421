// src/ingest/config.rs
//! Pipeline configuration: keyword taxonomy, source lists, rate limits and
//! storage settings. Loaded once at startup from TOML or JSON.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::model::DEFAULT_PRIORITY;
use crate::relevance::KeywordTaxonomy;

pub const ENV_CONFIG_PATH: &str = "NEWS_PIPELINE_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/sources.toml";
pub const DEFAULT_JSON_PATH: &str = "config/sources.json";

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}
fn default_true() -> bool {
    true
}
fn default_feed_category() -> String {
    "general".to_string()
}
fn default_scraper_category() -> String {
    "news".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    4
}
fn default_database_path() -> PathBuf {
    PathBuf::from("data/newsletter.db")
}
fn default_retention_days() -> u32 {
    30
}
fn default_title_selector() -> String {
    "h2, h3, .title".to_string()
}
fn default_date_selector() -> String {
    ".date, time".to_string()
}
fn default_description_selector() -> String {
    "p, .summary".to_string()
}
fn default_link_selector() -> String {
    "a".to_string()
}

/// The three keyword tiers, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default)]
    pub high_priority: Vec<String>,
    #[serde(default)]
    pub medium_priority: Vec<String>,
    #[serde(default)]
    pub event_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_category")]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain HTTP GET of the page.
    #[default]
    Static,
    /// Page is rendered by a headless browser endpoint first.
    Browser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selector matching one container per item (required).
    #[serde(alias = "event_container", alias = "article_container")]
    pub container: String,
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_date_selector")]
    pub date: String,
    #[serde(default = "default_description_selector")]
    pub description: String,
    #[serde(default = "default_link_selector")]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_scraper_category")]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub render: RenderMode,
    /// Origin for relative links; defaults to the page URL.
    #[serde(default)]
    pub base_url: Option<String>,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiting {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for RateLimiting {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl RateLimiting {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(alias = "parent_keywords")]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub rss_feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub scrapers: Vec<ScraperConfig>,
    #[serde(default)]
    pub rate_limiting: RateLimiting,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Browserless-style endpoint used by `render = "browser"` scrapers.
    #[serde(default)]
    pub browser_endpoint: Option<String>,
}

impl PipelineConfig {
    /// Build the immutable taxonomy; an empty taxonomy is a configuration error.
    pub fn taxonomy(&self) -> Result<KeywordTaxonomy> {
        let t = KeywordTaxonomy::new(
            self.keywords.high_priority.as_slice(),
            self.keywords.medium_priority.as_slice(),
            self.keywords.event_keywords.as_slice(),
        );
        if t.is_empty() {
            return Err(PipelineError::Configuration(
                "keyword taxonomy is empty".into(),
            ));
        }
        Ok(t)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    read_and_parse(path).map_err(|e| PipelineError::Configuration(format!("{e:#}")))
}

/// Load config using env var + fallbacks:
/// 1) $NEWS_PIPELINE_CONFIG
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_config_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(PipelineError::Configuration(format!(
            "{ENV_CONFIG_PATH} points to non-existent path {}",
            pb.display()
        )));
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    Err(PipelineError::Configuration(format!(
        "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    )))
}

fn read_and_parse(path: &Path) -> anyhow::Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Parse config text; `hint_ext` picks the first format to try.
pub fn parse_config(s: &str, hint_ext: &str) -> anyhow::Result<PipelineConfig> {
    let looks_json = hint_ext == "json" || s.trim_start().starts_with('{');
    let cfg: PipelineConfig = if looks_json {
        serde_json::from_str(s).context("parsing JSON config")?
    } else {
        toml::from_str(s).context("parsing TOML config")?
    };
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &PipelineConfig) -> anyhow::Result<()> {
    if cfg.rate_limiting.max_concurrency == 0 {
        return Err(anyhow!("rate_limiting.max_concurrency must be >= 1"));
    }
    for f in &cfg.rss_feeds {
        if f.name.trim().is_empty() {
            return Err(anyhow!("rss feed with empty name ({})", f.url));
        }
    }
    for s in &cfg.scrapers {
        if s.name.trim().is_empty() {
            return Err(anyhow!("scraper with empty name ({})", s.url));
        }
        if s.selectors.container.trim().is_empty() {
            return Err(anyhow!("scraper `{}` has no container selector", s.name));
        }
    }
    Ok(())
}
