// tests/metrics_ingest.rs
#![cfg(feature = "strict-metrics")]
use std::sync::Arc;

use family_news_pipeline::ingest::providers::RssProvider;
use family_news_pipeline::ingest::types::{SourceMeta, SourceProvider};
use family_news_pipeline::metrics::Metrics;
use family_news_pipeline::{ArticleStore, Collector, KeywordTaxonomy, RelevanceScorer};

#[tokio::test]
async fn metrics_exposed_after_collection_run() {
    // Installs the global recorder; this test binary has only this test
    let metrics = Metrics::init().expect("recorder");

    let xml = std::fs::read_to_string("tests/fixtures/family_rss.xml").expect("fixture");
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(RssProvider::from_fixture(
        SourceMeta::new("Family", "family"),
        &xml,
    ))];
    let scorer = Arc::new(RelevanceScorer::new(KeywordTaxonomy::new(
        &["school", "cmsd"],
        &["park"],
        &["festival"],
    )));
    let store = ArticleStore::open_in_memory().await.unwrap();
    Collector::new(providers, scorer, store).run_once().await.unwrap();

    // Scrape metrics text and check series presence by substring
    let out = metrics.render();
    for needle in [
        "ingest_events_total",
        "ingest_kept_total",
        "ingest_filtered_total",
        "ingest_skipped_total",
        "ingest_stored_total",
        "ingest_parse_ms",
        "ingest_pipeline_last_run_ts",
    ] {
        assert!(out.contains(needle), "metrics exposition missing '{needle}'\n{out}");
    }
}
