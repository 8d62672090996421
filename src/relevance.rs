// src/relevance.rs
//! Keyword relevance scoring: taxonomy, per-keyword regex compilation,
//! scoring weights, tier thresholds and primary-category selection.

use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::model::{Article, RelevanceLevel};

// --- scoring constants ---
pub const HIGH_PRIORITY_WEIGHT: f64 = 3.0;
pub const MEDIUM_PRIORITY_WEIGHT: f64 = 1.5;
pub const EVENT_WEIGHT: f64 = 1.5;
pub const DISTINCT_KEYWORD_BONUS: f64 = 0.5;
pub const MAX_SCORE: f64 = 20.0;

pub const HIGH_THRESHOLD: f64 = 5.0;
pub const MEDIUM_THRESHOLD: f64 = 2.0;

/// Combined text shorter than this is never matched.
pub const MIN_TEXT_CHARS: usize = 10;

pub const CATEGORY_EDUCATION_FAMILY: &str = "education_family";
pub const CATEGORY_ACTIVITIES_HEALTH: &str = "activities_health";
pub const CATEGORY_EVENTS: &str = "events";
pub const CATEGORY_GENERAL: &str = "general";

/// Keyword tier. Declaration order (High, Medium, Event) is also the
/// evaluation order and the category tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Medium,
    Event,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::High, Tier::Medium, Tier::Event];

    pub fn weight(self) -> f64 {
        match self {
            Tier::High => HIGH_PRIORITY_WEIGHT,
            Tier::Medium => MEDIUM_PRIORITY_WEIGHT,
            Tier::Event => EVENT_WEIGHT,
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Tier::High => CATEGORY_EDUCATION_FAMILY,
            Tier::Medium => CATEGORY_ACTIVITIES_HEALTH,
            Tier::Event => CATEGORY_EVENTS,
        }
    }
}

/* ----------------------------
Taxonomy
---------------------------- */

/// Immutable keyword taxonomy. Keywords are trimmed, lowercased and
/// deduplicated within a tier; declaration order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTaxonomy {
    high_priority: Vec<String>,
    medium_priority: Vec<String>,
    event_keywords: Vec<String>,
}

impl KeywordTaxonomy {
    pub fn new<S: AsRef<str>>(high: &[S], medium: &[S], event: &[S]) -> Self {
        Self {
            high_priority: clean_list(high),
            medium_priority: clean_list(medium),
            event_keywords: clean_list(event),
        }
    }

    pub fn tier(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::High => &self.high_priority,
            Tier::Medium => &self.medium_priority,
            Tier::Event => &self.event_keywords,
        }
    }

    pub fn is_empty(&self) -> bool {
        Tier::ALL.iter().all(|t| self.tier(*t).is_empty())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        Tier::ALL
            .iter()
            .any(|t| self.tier(*t).iter().any(|k| k == keyword))
    }
}

fn clean_list<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let k = it.as_ref().trim().to_lowercase();
        if !k.is_empty() && seen.insert(k.clone()) {
            out.push(k);
        }
    }
    out
}

/* ----------------------------
Scoring
---------------------------- */

/// Result of scoring one article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relevance {
    pub score: f64,
    pub level: RelevanceLevel,
    pub category: String,
    pub matched: BTreeSet<String>,
}

impl Default for Relevance {
    fn default() -> Self {
        Self {
            score: 0.0,
            level: RelevanceLevel::None,
            category: CATEGORY_GENERAL.to_string(),
            matched: BTreeSet::new(),
        }
    }
}

/// A single keyword match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: String,
    pub tier: Tier,
}

#[derive(Debug)]
struct CompiledKeyword {
    keyword: String,
    tier: Tier,
    re: Regex,
}

/// Scores articles against a taxonomy. Regexes are compiled once here;
/// scoring itself is pure and the scorer is `Send + Sync`.
#[derive(Debug)]
pub struct RelevanceScorer {
    taxonomy: KeywordTaxonomy,
    compiled: Vec<CompiledKeyword>,
}

impl RelevanceScorer {
    pub fn new(taxonomy: KeywordTaxonomy) -> Self {
        let mut compiled = Vec::new();
        let mut taken: HashSet<&str> = HashSet::new();
        for tier in Tier::ALL {
            for kw in taxonomy.tier(tier) {
                // a keyword listed in several tiers counts once, in its first tier
                if !taken.insert(kw.as_str()) {
                    continue;
                }
                let pattern = format!(r"(?i)\b{}s?\b", regex::escape(kw));
                // escaped literal, always valid
                let re = Regex::new(&pattern).unwrap();
                compiled.push(CompiledKeyword {
                    keyword: kw.clone(),
                    tier,
                    re,
                });
            }
        }
        Self { taxonomy, compiled }
    }

    pub fn taxonomy(&self) -> &KeywordTaxonomy {
        &self.taxonomy
    }

    /// All distinct keyword matches in `text`, in taxonomy declaration order.
    pub fn find_matches(&self, text: &str) -> Vec<KeywordMatch> {
        self.compiled
            .iter()
            .filter(|c| c.re.is_match(text))
            .map(|c| KeywordMatch {
                keyword: c.keyword.clone(),
                tier: c.tier,
            })
            .collect()
    }

    /// Weighted sum plus the distinct-keyword bonus, capped.
    pub fn score_matches(matches: &[KeywordMatch]) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }
        let weighted: f64 = matches.iter().map(|m| m.tier.weight()).sum();
        let distinct = matches
            .iter()
            .map(|m| m.keyword.as_str())
            .collect::<HashSet<_>>()
            .len();
        (weighted + distinct as f64 * DISTINCT_KEYWORD_BONUS).min(MAX_SCORE)
    }

    pub fn level_for(score: f64) -> RelevanceLevel {
        if score >= HIGH_THRESHOLD {
            RelevanceLevel::High
        } else if score >= MEDIUM_THRESHOLD {
            RelevanceLevel::Medium
        } else if score > 0.0 {
            RelevanceLevel::Low
        } else {
            RelevanceLevel::None
        }
    }

    /// Category with the most matches. Ties go to the tier evaluated first
    /// (high → medium → event); no matches → `general`.
    pub fn primary_category(matches: &[KeywordMatch]) -> &'static str {
        let mut best: Option<(Tier, usize)> = None;
        for tier in Tier::ALL {
            let n = matches.iter().filter(|m| m.tier == tier).count();
            if n == 0 {
                continue;
            }
            match best {
                Some((_, b)) if b >= n => {}
                _ => best = Some((tier, n)),
            }
        }
        best.map(|(t, _)| t.category()).unwrap_or(CATEGORY_GENERAL)
    }

    /// Score raw text (title + description + content already joined).
    pub fn score_text(&self, text: &str) -> Relevance {
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            return Relevance::default();
        }
        let matches = self.find_matches(text);
        let score = Self::score_matches(&matches);
        Relevance {
            score,
            level: Self::level_for(score),
            category: Self::primary_category(&matches).to_string(),
            matched: matches.into_iter().map(|m| m.keyword).collect(),
        }
    }

    pub fn score(&self, article: &Article) -> Relevance {
        let rel = self.score_text(&article.full_text());
        // Never log raw text. Only the id + short lists.
        debug!(
            target: "relevance",
            id = %article.id,
            score = rel.score,
            level = %rel.level,
            category = %rel.category,
            matched = ?rel.matched.iter().take(5).collect::<Vec<_>>(),
            "scored"
        );
        rel
    }

    /// Score and write the scoring-derived fields onto the article.
    pub fn apply(&self, article: &mut Article) -> RelevanceLevel {
        let rel = self.score(article);
        article.filter_score = Some(rel.score);
        article.filter_category = Some(rel.category);
        article.relevance_level = Some(rel.level);
        article.matched_keywords = rel.matched;
        rel.level
    }

    /// Score a batch; returns (relevant sorted by score desc, filtered out).
    pub fn filter_articles(&self, articles: Vec<Article>) -> (Vec<Article>, Vec<Article>) {
        let mut relevant = Vec::new();
        let mut filtered_out = Vec::new();
        for mut a in articles {
            if self.apply(&mut a) > RelevanceLevel::None {
                relevant.push(a);
            } else {
                filtered_out.push(a);
            }
        }
        relevant.sort_by(|a, b| b.score_or_zero().total_cmp(&a.score_or_zero()));
        (relevant, filtered_out)
    }
}

/* ----------------------------
Batch summary
---------------------------- */

/// Aggregate view over scored articles, for run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub total_articles: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_relevance: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    /// Top 10 keywords, most frequent first (ties: keyword ascending).
    pub top_keywords: Vec<(String, usize)>,
}

pub fn summarize(articles: &[Article]) -> FilterSummary {
    let mut s = FilterSummary {
        total_articles: articles.len(),
        ..Default::default()
    };
    for lvl in ["high", "medium", "low"] {
        s.by_relevance.insert(lvl.to_string(), 0);
    }

    let mut kw_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for a in articles {
        let cat = a.filter_category.as_deref().unwrap_or(CATEGORY_GENERAL);
        *s.by_category.entry(cat.to_string()).or_insert(0) += 1;
        if let Some(l) = a.relevance_level {
            // `none` is never tracked here
            if let Some(c) = s.by_relevance.get_mut(l.as_str()) {
                *c += 1;
            }
        }
        *s.by_source.entry(a.source.clone()).or_insert(0) += 1;
        for k in &a.matched_keywords {
            *kw_counts.entry(k.as_str()).or_insert(0) += 1;
        }
    }

    let mut sorted: Vec<(&str, usize)> = kw_counts.into_iter().collect();
    sorted.sort_by_key(|(k, n)| (Reverse(*n), *k));
    s.top_keywords = sorted
        .into_iter()
        .take(10)
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    s
}

/* ----------------------------
Tests
---------------------------- */
