// src/model.rs
//! Canonical data shapes shared by the pipeline: `Article`, relevance tiers,
//! origin types and the append-only collection-run log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default source priority when a fetcher doesn't declare one (1 = highest).
pub const DEFAULT_PRIORITY: i64 = 2;

/// Where an article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginType {
    Rss,
    Scraped,
    BrowserScraped,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Rss => "rss",
            OriginType::Scraped => "scraped",
            OriginType::BrowserScraped => "browser-scraped",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OriginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(OriginType::Rss),
            "scraped" => Ok(OriginType::Scraped),
            "browser-scraped" => Ok(OriginType::BrowserScraped),
            other => Err(format!("unknown origin type `{other}`")),
        }
    }
}

/// Coarse relevance bucket derived from the score thresholds.
/// Ordered so that `High > Medium > Low > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceLevel {
    None,
    Low,
    Medium,
    High,
}

impl RelevanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceLevel::None => "none",
            RelevanceLevel::Low => "low",
            RelevanceLevel::Medium => "medium",
            RelevanceLevel::High => "high",
        }
    }

    /// Levels at or above `self`, highest first.
    pub fn at_or_above(self) -> Vec<RelevanceLevel> {
        [
            RelevanceLevel::High,
            RelevanceLevel::Medium,
            RelevanceLevel::Low,
            RelevanceLevel::None,
        ]
        .into_iter()
        .filter(|l| *l >= self)
        .collect()
    }
}

impl fmt::Display for RelevanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelevanceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(RelevanceLevel::None),
            "low" => Ok(RelevanceLevel::Low),
            "medium" => Ok(RelevanceLevel::Medium),
            "high" => Ok(RelevanceLevel::High),
            other => Err(format!("unknown relevance level `{other}`")),
        }
    }
}

/// The canonical unit produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub content: String,
    pub source: String,
    pub category: String,
    pub priority: i64,
    pub published_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub origin_type: OriginType,

    // Scoring-derived; absent until scored.
    pub filter_score: Option<f64>,
    pub filter_category: Option<String>,
    pub relevance_level: Option<RelevanceLevel>,
    #[serde(default)]
    pub matched_keywords: BTreeSet<String>,

    // Persistence flags.
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub is_sent: bool,
    /// Assigned by the store on first insert; never changed afterwards.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Title + description + content, as matched by the scorer.
    pub fn full_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.content)
    }

    pub fn is_scored(&self) -> bool {
        self.relevance_level.is_some()
    }

    /// Scored and above `none`.
    pub fn is_relevant(&self) -> bool {
        matches!(self.relevance_level, Some(l) if l > RelevanceLevel::None)
    }

    pub fn score_or_zero(&self) -> f64 {
        self.filter_score.unwrap_or(0.0)
    }
}

/// Final status of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every configured source answered.
    Completed,
    /// At least one source failed; the rest were processed.
    Partial,
    /// Storage became unavailable mid-run.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RunStatus::Completed),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status `{other}`")),
        }
    }
}

/// A run-log entry about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCollectionRun {
    pub run_at: DateTime<Utc>,
    pub rss_articles: i64,
    pub scraped_articles: i64,
    pub filtered_articles: i64,
    pub failed_sources: i64,
    pub status: RunStatus,
}

/// A persisted run-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRun {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    pub rss_articles: i64,
    pub scraped_articles: i64,
    pub filtered_articles: i64,
    pub failed_sources: i64,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_levels_order_and_parse() {
        assert!(RelevanceLevel::High > RelevanceLevel::Medium);
        assert!(RelevanceLevel::Low > RelevanceLevel::None);
        assert_eq!("Medium".parse::<RelevanceLevel>(), Ok(RelevanceLevel::Medium));
        assert!("urgent".parse::<RelevanceLevel>().is_err());
        assert_eq!(
            RelevanceLevel::Medium.at_or_above(),
            vec![RelevanceLevel::High, RelevanceLevel::Medium]
        );
    }

    #[test]
    fn origin_type_serializes_kebab_case() {
        let s = serde_json::to_string(&OriginType::BrowserScraped).unwrap();
        assert_eq!(s, "\"browser-scraped\"");
        assert_eq!(
            "browser-scraped".parse::<OriginType>(),
            Ok(OriginType::BrowserScraped)
        );
    }
}
