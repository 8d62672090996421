// tests/sections.rs
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use family_news_pipeline::config::SelectorConfig;
use family_news_pipeline::ingest::providers::{PageSelectors, RssProvider, ScrapeProvider};
use family_news_pipeline::ingest::types::{SourceMeta, SourceProvider};
use family_news_pipeline::{
    categorize, ArticleStore, Collector, KeywordTaxonomy, RelevanceLevel, RelevanceScorer, Section,
};

const FAMILY_XML: &str = include_str!("fixtures/family_rss.xml");
const EVENTS_HTML: &str = include_str!("fixtures/library_events.html");

async fn collected_store() -> ArticleStore {
    let scorer = Arc::new(RelevanceScorer::new(KeywordTaxonomy::new(
        &["school", "cmsd", "student", "teacher", "kids", "family"],
        &["park", "metroparks", "library", "playground", "safety", "health"],
        &["festival", "storytime", "workshop", "event"],
    )));
    let selectors = PageSelectors::from_config(&SelectorConfig {
        container: ".event-card".into(),
        title: "h3, .title".into(),
        date: ".date, time".into(),
        description: ".summary, p".into(),
        link: "a".into(),
    })
    .unwrap();
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(RssProvider::from_fixture(
            SourceMeta::new("Cleveland Family News", "family").with_base_url("https://news.test/family"),
            FAMILY_XML,
        )),
        Box::new(ScrapeProvider::from_fixture(
            SourceMeta::new("CPL Calendar", "library").with_base_url("https://cpl.test/events/"),
            selectors,
            EVENTS_HTML,
            false,
        )),
    ];
    let store = ArticleStore::open_in_memory().await.unwrap();
    Collector::new(providers, scorer, store.clone())
        .run_at(Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap())
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn stored_articles_land_in_exactly_one_section() {
    let store = collected_store().await;
    let candidates = store.newsletter_candidates(50, RelevanceLevel::Low).await.unwrap();
    assert_eq!(candidates.len(), 5);

    let sections = categorize(&candidates);
    assert_eq!(sections.total(), candidates.len());

    let mut seen = HashSet::new();
    for (_, arts) in sections.iter() {
        for a in arts {
            assert!(seen.insert(a.id.clone()), "article {} in two sections", a.id);
        }
    }
    assert_eq!(seen.len(), candidates.len());

    let education: Vec<&str> = sections
        .get(Section::Education)
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(
        education,
        vec!["CMSD Announces New School Safety Initiative", "Teen STEM Workshop"]
    );
    assert_eq!(sections.get(Section::Events).len(), 2);
    assert_eq!(sections.get(Section::Parks).len(), 1);
    assert!(sections.get(Section::Library).is_empty());
    assert!(sections.get(Section::News).is_empty());
}

#[tokio::test]
async fn truncated_sections_keep_the_best() {
    let store = collected_store().await;
    let candidates = store.newsletter_candidates(50, RelevanceLevel::Medium).await.unwrap();
    let mut sections = categorize(&candidates);
    sections.truncate(1);
    let edu = sections.get(Section::Education);
    assert_eq!(edu.len(), 1);
    assert_eq!(edu[0].title, "CMSD Announces New School Safety Initiative");
    assert_eq!(Section::Education.heading(), "Education & Schools");
}
