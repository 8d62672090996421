// tests/providers_rss.rs
use chrono::{TimeZone, Utc};
use family_news_pipeline::ingest::normalize;
use family_news_pipeline::ingest::providers::RssProvider;
use family_news_pipeline::config::load_config_from;
use family_news_pipeline::ingest::types::{RawRecord, SourceMeta, SourceProvider};
use family_news_pipeline::{RelevanceLevel, RelevanceScorer};
use std::path::Path;

const FAMILY_XML: &str = include_str!("fixtures/family_rss.xml");

fn meta() -> SourceMeta {
    SourceMeta::new("Cleveland Family News", "family")
        .with_priority(1)
        .with_base_url("https://news.test/family")
}

#[tokio::test]
async fn fixture_yields_every_item() {
    let p = RssProvider::from_fixture(meta(), FAMILY_XML);
    let items = p.fetch_latest().await.expect("rss parse ok");
    assert_eq!(items.len(), 5);
    assert!(items.iter().all(RawRecord::is_rss));
    assert_eq!(p.name(), "Cleveland Family News");
}

#[tokio::test]
async fn fixture_items_normalize_with_fallbacks() {
    let p = RssProvider::from_fixture(meta(), FAMILY_XML);
    let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
    let items = p.fetch_latest().await.unwrap();

    let arts: Vec<_> = items
        .iter()
        .filter_map(|r| normalize(r, p.meta(), now).ok())
        .collect();
    // the untitled item is dropped
    assert_eq!(arts.len(), 4);

    let playground = &arts[1];
    assert_eq!(playground.url, "https://news.test/family/lakewood-playground");
    assert_eq!(
        playground.published_at,
        Utc.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap()
    );

    let festival = &arts[2];
    assert_eq!(festival.title, "Spring Festival Returns Downtown");
    assert_eq!(festival.published_at, now);

    assert_eq!(
        arts[0].description,
        "The district will add safety staff at every school this fall."
    );
    assert!(arts.iter().all(|a| a.priority == 1 && a.category == "family"));
}

const BLOG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
  xmlns:content="http://purl.org/rss/1.0/modules/content/"
  xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Neighborhood Blog</title>
    <item>
      <title>Weekend roundup</title>
      <link>https://blog.test/weekend-roundup</link>
      <atom:link href="https://blog.test/feed" rel="self"/>
      <description>A few things to try.</description>
      <atom:updated>2025-03-03T08:00:00Z</atom:updated>
      <content:encoded><![CDATA[<p>The CMSD school board votes on a new student meal plan.</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn keywords_in_encoded_body_are_scored() {
    let cfg = load_config_from(Path::new("config/sources.toml")).unwrap();
    let scorer = RelevanceScorer::new(cfg.taxonomy().unwrap());
    let p = RssProvider::from_fixture(SourceMeta::new("Neighborhood Blog", "family"), BLOG_XML);
    let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();

    let items = p.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 1);
    let mut art = normalize(&items[0], p.meta(), now).unwrap();

    assert!(art.content.contains("CMSD school board"));
    assert_eq!(art.url, "https://blog.test/weekend-roundup");
    // no pubDate or dc:date, so the updated stamp is used
    assert_eq!(art.published_at, Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap());

    assert_eq!(
        scorer.score_text(&format!("{} {}", art.title, art.description)).level,
        RelevanceLevel::None
    );
    assert_eq!(scorer.apply(&mut art), RelevanceLevel::High);
    assert!(art.matched_keywords.contains("cmsd"));
}
