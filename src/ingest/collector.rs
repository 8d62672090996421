// src/ingest/collector.rs
//! One collection run: fetch → normalize → dedup → score → store → log.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::ingest::config::PipelineConfig;
use crate::ingest::types::{RawRecord, SourceMeta, SourceProvider};
use crate::ingest::{dedup_by_id, ensure_metrics_described, normalize, providers};
use crate::model::{Article, NewCollectionRun, RunStatus};
use crate::relevance::{summarize, FilterSummary, RelevanceScorer};
use crate::store::ArticleStore;

/// Outcome of one run, as returned to the caller and written to logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub rss_articles: usize,
    pub scraped_articles: usize,
    pub total_collected: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub relevant_articles: usize,
    pub filtered_out: usize,
    pub stored: usize,
    /// Names of sources that errored or timed out, in configured order.
    pub failed_sources: Vec<String>,
    pub status: RunStatus,
    pub run_id: i64,
    pub filter_summary: FilterSummary,
}

#[derive(Serialize)]
struct RawSnapshotEntry<'a> {
    source: &'a str,
    record: &'a RawRecord,
}

pub struct Collector {
    providers: Vec<Box<dyn SourceProvider>>,
    scorer: Arc<RelevanceScorer>,
    store: ArticleStore,
    max_concurrency: usize,
    source_timeout: Duration,
    snapshot_dir: Option<PathBuf>,
}

impl Collector {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        scorer: Arc<RelevanceScorer>,
        store: ArticleStore,
    ) -> Self {
        Self {
            providers,
            scorer,
            store,
            max_concurrency: 4,
            source_timeout: Duration::from_secs(30),
            snapshot_dir: None,
        }
    }

    /// Wire providers, scorer and limits from the loaded configuration.
    pub fn from_config(cfg: &PipelineConfig, store: ArticleStore) -> Result<Self> {
        let scorer = RelevanceScorer::new(cfg.taxonomy()?);
        let providers = providers::from_config(cfg)?;
        let mut c = Self::new(providers, Arc::new(scorer), store)
            .with_concurrency(cfg.rate_limiting.max_concurrency)
            .with_timeout(cfg.rate_limiting.timeout());
        if let Some(dir) = &cfg.snapshot_dir {
            c = c.with_snapshot_dir(dir);
        }
        Ok(c)
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit clock reading (used as every article's `collected_at`).
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        ensure_metrics_described();
        tracing::info!(target: "ingest", providers = self.providers.len(), "collection run started");

        // 1) fetch, bounded fan-out; results back in configured order
        let mut fetched: Vec<(usize, Result<Vec<RawRecord>>)> = stream::iter(self.providers.iter().enumerate())
            .map(|(idx, p)| async move { (idx, self.fetch_one(p.as_ref()).await) })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        fetched.sort_by_key(|(idx, _)| *idx);

        let mut failed_sources = Vec::new();
        let mut batches: Vec<(&SourceMeta, Vec<RawRecord>)> = Vec::with_capacity(fetched.len());
        for (idx, res) in fetched {
            let p = &self.providers[idx];
            match res {
                Ok(records) => batches.push((p.meta(), records)),
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, provider = p.name(), "provider error");
                    counter!("ingest_provider_errors_total").increment(1);
                    failed_sources.push(p.name().to_string());
                }
            }
        }

        let rss_articles: usize = batches
            .iter()
            .map(|(_, rs)| rs.iter().filter(|r| r.is_rss()).count())
            .sum();
        let scraped_articles: usize = batches
            .iter()
            .map(|(_, rs)| rs.iter().filter(|r| !r.is_rss()).count())
            .sum();

        // 2) normalize
        let mut skipped = 0usize;
        let mut articles: Vec<Article> = Vec::with_capacity(rss_articles + scraped_articles);
        for (meta, records) in &batches {
            for raw in records {
                match normalize(raw, meta, now) {
                    Ok(a) => articles.push(a),
                    Err(e) => {
                        tracing::debug!(target: "ingest", source = %meta.name, reason = %e, "record skipped");
                        skipped += 1;
                    }
                }
            }
        }
        counter!("ingest_skipped_total").increment(skipped as u64);

        // 3) dedup within the run
        let (unique, duplicates) = dedup_by_id(articles);
        counter!("ingest_dedup_total").increment(duplicates as u64);

        // 4) score + drop `none`
        let (relevant, filtered_out) = self.scorer.filter_articles(unique);
        counter!("ingest_kept_total").increment(relevant.len() as u64);
        counter!("ingest_filtered_total").increment(filtered_out.len() as u64);
        let filter_summary = summarize(&relevant);

        let status = if failed_sources.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        };
        let mut run = NewCollectionRun {
            run_at: now,
            rss_articles: rss_articles as i64,
            scraped_articles: scraped_articles as i64,
            filtered_articles: relevant.len() as i64,
            failed_sources: failed_sources.len() as i64,
            status,
        };

        // 5) persist; storage failure ends the run
        let stored = match self.store.upsert_many(&relevant).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, "storage failed; aborting run");
                run.status = RunStatus::Failed;
                if let Err(log_err) = self.store.log_run(&run).await {
                    tracing::warn!(target: "ingest", error = %log_err, "could not record failed run");
                }
                return Err(PipelineError::StorageUnavailable(e));
            }
        };
        counter!("ingest_stored_total").increment(stored as u64);

        // 6) append the run log entry
        let run_id = self.store.log_run(&run).await?;
        gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);

        if let Some(dir) = &self.snapshot_dir {
            if let Err(e) = write_snapshots(dir, now, &batches, &relevant).await {
                tracing::warn!(target: "ingest", error = ?e, dir = %dir.display(), "snapshot write failed");
            }
        }

        let report = RunReport {
            timestamp: now,
            rss_articles,
            scraped_articles,
            total_collected: rss_articles + scraped_articles,
            skipped,
            duplicates,
            relevant_articles: relevant.len(),
            filtered_out: filtered_out.len(),
            stored,
            failed_sources,
            status,
            run_id,
            filter_summary,
        };

        tracing::info!(
            target: "ingest",
            run_id,
            status = status.as_str(),
            rss = report.rss_articles,
            scraped = report.scraped_articles,
            skipped,
            duplicates,
            relevant = report.relevant_articles,
            filtered = report.filtered_out,
            failed = report.failed_sources.len(),
            "collection run finished"
        );
        Ok(report)
    }

    async fn fetch_one(&self, p: &dyn SourceProvider) -> Result<Vec<RawRecord>> {
        match tokio::time::timeout(self.source_timeout, p.fetch_latest()).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(e)) => Err(PipelineError::unavailable(p.name(), format!("{e:#}"))),
            Err(_) => Err(PipelineError::unavailable(
                p.name(),
                format!("timed out after {:?}", self.source_timeout),
            )),
        }
    }
}

async fn write_snapshots(
    dir: &Path,
    now: DateTime<Utc>,
    batches: &[(&SourceMeta, Vec<RawRecord>)],
    processed: &[Article],
) -> anyhow::Result<()> {
    use anyhow::Context;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    let stamp = now.format("%Y%m%d_%H%M%S");

    let raw: Vec<RawSnapshotEntry<'_>> = batches
        .iter()
        .flat_map(|(meta, records)| {
            records.iter().map(move |record| RawSnapshotEntry {
                source: &meta.name,
                record,
            })
        })
        .collect();
    let raw_path = dir.join(format!("raw_{stamp}.json"));
    tokio::fs::write(&raw_path, serde_json::to_vec_pretty(&raw)?)
        .await
        .with_context(|| format!("writing {}", raw_path.display()))?;

    let processed_path = dir.join(format!("processed_{stamp}.json"));
    tokio::fs::write(&processed_path, serde_json::to_vec_pretty(processed)?)
        .await
        .with_context(|| format!("writing {}", processed_path.display()))?;

    tracing::debug!(target: "ingest", dir = %dir.display(), "snapshots written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RssRecord;
    use crate::relevance::KeywordTaxonomy;
    use async_trait::async_trait;

    struct Fixed {
        meta: SourceMeta,
        records: Vec<RawRecord>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl Fixed {
        fn new(name: &str, titles: &[&str]) -> Self {
            let records = titles
                .iter()
                .map(|t| {
                    RawRecord::Rss(RssRecord {
                        title: Some(t.to_string()),
                        link: Some(format!("https://{name}.test/{}", t.len())),
                        ..Default::default()
                    })
                })
                .collect();
            Self {
                meta: SourceMeta::new(name, "news"),
                records,
                delay: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SourceProvider for Fixed {
        async fn fetch_latest(&self) -> anyhow::Result<Vec<RawRecord>> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(self.records.clone())
        }
        fn name(&self) -> &str {
            &self.meta.name
        }
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }
    }

    fn scorer() -> Arc<RelevanceScorer> {
        Arc::new(RelevanceScorer::new(KeywordTaxonomy::new(
            &["school", "cmsd"],
            &["park"],
            &["festival"],
        )))
    }

    #[tokio::test]
    async fn slow_source_times_out_without_blocking_others() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let mut slow = Fixed::new("slow", &["School board meets tonight"]);
        slow.delay = Some(Duration::from_secs(5));
        let fast = Fixed::new("fast", &["CMSD school calendar released"]);

        let c = Collector::new(vec![Box::new(slow), Box::new(fast)], scorer(), store)
            .with_timeout(Duration::from_millis(50));
        let r = c.run_once().await.unwrap();
        assert_eq!(r.failed_sources, vec!["slow".to_string()]);
        assert_eq!(r.status, RunStatus::Partial);
        assert_eq!(r.stored, 1);
    }

    #[tokio::test]
    async fn counts_skips_duplicates_and_filtered() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let mut a = Fixed::new("a", &["CMSD school calendar released", "Weather is mild today"]);
        a.records.push(RawRecord::Rss(RssRecord::default()));
        a.records.push(a.records[0].clone());

        let c = Collector::new(vec![Box::new(a)], scorer(), store.clone());
        let r = c.run_once().await.unwrap();
        assert_eq!(r.rss_articles, 4);
        assert_eq!(r.skipped, 1);
        assert_eq!(r.duplicates, 1);
        assert_eq!(r.relevant_articles, 1);
        assert_eq!(r.filtered_out, 1);
        assert_eq!(r.status, RunStatus::Completed);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.runs(1).await.unwrap()[0].id, r.run_id);
    }

    #[tokio::test]
    async fn closed_store_fails_the_run() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        store.close().await;
        let c = Collector::new(
            vec![Box::new(Fixed::new("a", &["CMSD school calendar released"]))],
            scorer(),
            store,
        );
        let err = c.run_once().await.unwrap_err();
        assert!(matches!(err, PipelineError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn writes_snapshots_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArticleStore::open_in_memory().await.unwrap();
        let c = Collector::new(
            vec![Box::new(Fixed::new("a", &["CMSD school calendar released"]))],
            scorer(),
            store,
        )
        .with_snapshot_dir(dir.path());
        c.run_once().await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("raw_")));
        assert!(names.iter().any(|n| n.starts_with("processed_")));
    }
}
