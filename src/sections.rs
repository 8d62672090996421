// src/sections.rs
//! Buckets stored articles into newsletter sections.
//!
//! Rules are checked in precedence order and the first hit wins, so every
//! article lands in exactly one section.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::model::Article;

/// Newsletter sections, declared in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Education,
    Events,
    Parks,
    Library,
    Health,
    News,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Education,
        Section::Events,
        Section::Parks,
        Section::Library,
        Section::Health,
        Section::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Education => "education",
            Section::Events => "events",
            Section::Parks => "parks",
            Section::Library => "library",
            Section::Health => "health",
            Section::News => "news",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            Section::Education => "Education & Schools",
            Section::Events => "Family Events & Activities",
            Section::Parks => "Parks & Recreation",
            Section::Library => "Library & Learning",
            Section::Health => "Health & Safety",
            Section::News => "Local News for Parents",
        }
    }

    /// Substrings that route an article here. `News` has none (catch-all).
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Section::Education => &["school", "cmsd", "education", "teacher", "student", "classroom"],
            Section::Events => &["event", "family fun", "workshop", "camp", "storytime"],
            Section::Parks => &["park", "metroparks", "zoo", "playground", "outdoor"],
            Section::Library => &["library", "reading", "book", "cpl"],
            Section::Health => &["health", "safety", "vaccination", "hospital", "clinic"],
            Section::News => &[],
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.keywords().iter().any(|k| haystack.contains(k))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased text the section rules are matched against.
fn haystack(a: &Article) -> String {
    let keywords: Vec<&str> = a.matched_keywords.iter().map(String::as_str).collect();
    format!(
        "{} {} {} {} {}",
        keywords.join(" "),
        a.filter_category.as_deref().unwrap_or_default(),
        a.source,
        a.description,
        a.title
    )
    .to_lowercase()
}

pub fn section_for(article: &Article) -> Section {
    let text = haystack(article);
    Section::ALL
        .into_iter()
        .find(|s| s.matches(&text))
        .unwrap_or(Section::News)
}

/// All six sections, each ordered by score (best first).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SectionedArticles {
    sections: BTreeMap<Section, Vec<Article>>,
}

impl SectionedArticles {
    pub fn get(&self, section: Section) -> &[Article] {
        self.sections
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sections in precedence order, empty ones included.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &[Article])> {
        self.sections.iter().map(|(s, v)| (*s, v.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Keep at most `max` articles per section.
    pub fn truncate(&mut self, max: usize) {
        for v in self.sections.values_mut() {
            v.truncate(max);
        }
    }
}

pub fn categorize(articles: &[Article]) -> SectionedArticles {
    let mut sections: BTreeMap<Section, Vec<Article>> =
        Section::ALL.into_iter().map(|s| (s, Vec::new())).collect();
    for a in articles {
        sections.entry(section_for(a)).or_default().push(a.clone());
    }
    for v in sections.values_mut() {
        // stable: equal scores keep input order
        v.sort_by(|a, b| b.score_or_zero().total_cmp(&a.score_or_zero()));
    }
    tracing::debug!(target: "sections", articles = articles.len(), "articles categorized");
    SectionedArticles { sections }
}
