// src/store.rs
//! SQLite-backed article store.
//!
//! Every article row is keyed by its content identity, so re-collecting the
//! same item updates it in place. `created_at` and `is_sent` are owned by the
//! store and the newsletter side respectively; upserts never touch them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use crate::error::StorageError;
use crate::model::{Article, CollectionRun, NewCollectionRun, OriginType, RelevanceLevel, RunStatus};

type Result<T> = std::result::Result<T, StorageError>;

/// Fixed-width UTC timestamp so that string order is time order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(id: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            id: id.to_string(),
            reason: format!("timestamp `{raw}`: {e}"),
        })
}

fn corrupt(id: &str, reason: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Conjunctive filters over stored articles.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub limit: i64,
    /// Exact tier match.
    pub relevance_level: Option<RelevanceLevel>,
    /// This tier or better.
    pub min_relevance: Option<RelevanceLevel>,
    pub source: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub unprocessed_only: bool,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            relevance_level: None,
            min_relevance: None,
            source: None,
            since: None,
            unprocessed_only: false,
        }
    }
}

impl ArticleQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn relevance(mut self, level: RelevanceLevel) -> Self {
        self.relevance_level = Some(level);
        self
    }

    pub fn at_least(mut self, level: RelevanceLevel) -> Self {
        self.min_relevance = Some(level);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn unprocessed_only(mut self) -> Self {
        self.unprocessed_only = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_articles: i64,
    /// High plus medium.
    pub relevant_articles: i64,
    /// Count descending.
    pub by_source: Vec<(String, i64)>,
    pub by_relevance: BTreeMap<String, i64>,
    pub last_collection: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    /// Open (creating if needed) the database file and migrate.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(target: "store", path = %path.display(), "store opened");
        Ok(store)
    }

    /// Private in-memory database; one connection that never expires.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Close the pool; later calls fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                category TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 2,
                published_at TEXT NOT NULL,
                collected_at TEXT NOT NULL,
                article_type TEXT NOT NULL,
                filter_score REAL,
                filter_category TEXT,
                relevance_level TEXT,
                matched_keywords TEXT NOT NULL DEFAULT '[]',
                is_processed INTEGER NOT NULL DEFAULT 0,
                is_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collection_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_at TEXT NOT NULL,
                rss_articles INTEGER NOT NULL DEFAULT 0,
                scraped_articles INTEGER NOT NULL DEFAULT 0,
                filtered_articles INTEGER NOT NULL DEFAULT 0,
                failed_sources INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_articles_collected ON articles(collected_at)",
            "CREATE INDEX IF NOT EXISTS idx_articles_score ON articles(filter_score)",
            "CREATE INDEX IF NOT EXISTS idx_articles_relevance ON articles(relevance_level)",
            "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source)",
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert or replace by id. Only scored, relevant articles are accepted.
    pub async fn upsert(&self, a: &Article) -> Result<()> {
        let level = match a.relevance_level {
            Some(l) if l > RelevanceLevel::None => l,
            other => {
                return Err(StorageError::Rejected {
                    id: a.id.clone(),
                    reason: format!(
                        "relevance {} is not storable",
                        other.map(|l| l.as_str()).unwrap_or("unscored")
                    ),
                })
            }
        };
        let keywords = serde_json::to_string(&a.matched_keywords).map_err(|e| StorageError::Rejected {
            id: a.id.clone(),
            reason: format!("matched_keywords: {e}"),
        })?;

        sqlx::query(
            r#"
            INSERT INTO articles (
                id, title, url, description, content, source, category, priority,
                published_at, collected_at, article_type, filter_score, filter_category,
                relevance_level, matched_keywords, is_processed, is_sent, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                description = excluded.description,
                content = excluded.content,
                source = excluded.source,
                category = excluded.category,
                priority = excluded.priority,
                published_at = excluded.published_at,
                collected_at = excluded.collected_at,
                article_type = excluded.article_type,
                filter_score = excluded.filter_score,
                filter_category = excluded.filter_category,
                relevance_level = excluded.relevance_level,
                matched_keywords = excluded.matched_keywords,
                is_processed = 1
        "#,
        )
        .bind(&a.id)
        .bind(&a.title)
        .bind(&a.url)
        .bind(&a.description)
        .bind(&a.content)
        .bind(&a.source)
        .bind(&a.category)
        .bind(a.priority)
        .bind(ts(&a.published_at))
        .bind(ts(&a.collected_at))
        .bind(a.origin_type.as_str())
        .bind(a.filter_score)
        .bind(a.filter_category.as_deref())
        .bind(level.as_str())
        .bind(keywords)
        .bind(ts(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert each article in order; stops at the first failure.
    pub async fn upsert_many(&self, articles: &[Article]) -> Result<usize> {
        for a in articles {
            self.upsert(a).await?;
        }
        tracing::debug!(target: "store", stored = articles.len(), "articles upserted");
        Ok(articles.len())
    }

    pub async fn query(&self, q: &ArticleQuery) -> Result<Vec<Article>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM articles WHERE 1=1");
        if let Some(level) = q.relevance_level {
            qb.push(" AND relevance_level = ").push_bind(level.as_str());
        }
        if let Some(min) = q.min_relevance {
            qb.push(" AND relevance_level IN (");
            let mut sep = qb.separated(", ");
            for l in min.at_or_above() {
                sep.push_bind(l.as_str());
            }
            sep.push_unseparated(")");
        }
        if let Some(source) = &q.source {
            qb.push(" AND source = ").push_bind(source.clone());
        }
        if let Some(since) = &q.since {
            qb.push(" AND collected_at >= ").push_bind(ts(since));
        }
        if q.unprocessed_only {
            qb.push(" AND is_processed = 0");
        }
        qb.push(" ORDER BY filter_score DESC, collected_at DESC, id ASC LIMIT ")
            .push_bind(q.limit.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(article_from_row).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Flag articles as published. Unknown ids are ignored.
    pub async fn mark_sent(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE articles SET is_sent = 1 WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id.clone());
        }
        sep.push_unseparated(")");
        let res = qb.build().execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let total_articles = self.count().await?;

        let relevant_articles: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE relevance_level IN ('high', 'medium')",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_source: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) AS n FROM articles GROUP BY source ORDER BY n DESC, source ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_relevance: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT relevance_level, COUNT(*) FROM articles GROUP BY relevance_level",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_relevance = by_relevance
            .into_iter()
            .map(|(l, n)| (l.unwrap_or_else(|| "unscored".to_string()), n))
            .collect();

        let last: Option<String> = sqlx::query_scalar("SELECT MAX(collected_at) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        let last_collection = last.map(|s| parse_ts("articles.collected_at", &s)).transpose()?;

        Ok(StoreStats {
            total_articles,
            relevant_articles,
            by_source,
            by_relevance,
            last_collection,
        })
    }

    /// Delete sent articles collected more than `max_age` ago.
    pub async fn retention_sweep(&self, max_age: chrono::Duration) -> Result<u64> {
        self.retention_sweep_at(max_age, Utc::now()).await
    }

    pub async fn retention_sweep_at(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - max_age;
        let res = sqlx::query("DELETE FROM articles WHERE collected_at < ? AND is_sent = 1")
            .bind(ts(&cutoff))
            .execute(&self.pool)
            .await?;
        let deleted = res.rows_affected();
        tracing::info!(target: "store", deleted, cutoff = %ts(&cutoff), "retention sweep");
        Ok(deleted)
    }

    /// Append a run-log entry; returns its id.
    pub async fn log_run(&self, run: &NewCollectionRun) -> Result<i64> {
        let res = sqlx::query(
            r#"
            INSERT INTO collection_runs (
                run_at, rss_articles, scraped_articles, filtered_articles, failed_sources, status
            ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(ts(&run.run_at))
        .bind(run.rss_articles)
        .bind(run.scraped_articles)
        .bind(run.filtered_articles)
        .bind(run.failed_sources)
        .bind(run.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    /// Most recent runs first.
    pub async fn runs(&self, limit: i64) -> Result<Vec<CollectionRun>> {
        let rows = sqlx::query("SELECT * FROM collection_runs ORDER BY id DESC LIMIT ?")
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(run_from_row).collect()
    }

    pub async fn run_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collection_runs")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Stored articles at `min_relevance` or better, best first.
    pub async fn newsletter_candidates(&self, limit: i64, min_relevance: RelevanceLevel) -> Result<Vec<Article>> {
        self.query(&ArticleQuery::new().limit(limit).at_least(min_relevance))
            .await
    }
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let id: String = row.try_get("id")?;

    let origin: String = row.try_get("article_type")?;
    let origin_type = OriginType::from_str(&origin).map_err(|e| corrupt(&id, e))?;

    let level: Option<String> = row.try_get("relevance_level")?;
    let relevance_level = level
        .map(|l| RelevanceLevel::from_str(&l))
        .transpose()
        .map_err(|e| corrupt(&id, e))?;

    let keywords: String = row.try_get("matched_keywords")?;
    let matched_keywords: BTreeSet<String> =
        serde_json::from_str(&keywords).map_err(|e| corrupt(&id, format!("matched_keywords: {e}")))?;

    let published: String = row.try_get("published_at")?;
    let collected: String = row.try_get("collected_at")?;
    let created: String = row.try_get("created_at")?;

    Ok(Article {
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        category: row.try_get("category")?,
        priority: row.try_get("priority")?,
        published_at: parse_ts(&id, &published)?,
        collected_at: parse_ts(&id, &collected)?,
        origin_type,
        filter_score: row.try_get("filter_score")?,
        filter_category: row.try_get("filter_category")?,
        relevance_level,
        matched_keywords,
        is_processed: row.try_get("is_processed")?,
        is_sent: row.try_get("is_sent")?,
        created_at: Some(parse_ts(&id, &created)?),
        id,
    })
}

fn run_from_row(row: &SqliteRow) -> Result<CollectionRun> {
    let id: i64 = row.try_get("id")?;
    let key = format!("run {id}");
    let run_at: String = row.try_get("run_at")?;
    let status: String = row.try_get("status")?;
    Ok(CollectionRun {
        id,
        run_at: parse_ts(&key, &run_at)?,
        rss_articles: row.try_get("rss_articles")?,
        scraped_articles: row.try_get("scraped_articles")?,
        filtered_articles: row.try_get("filtered_articles")?,
        failed_sources: row.try_get("failed_sources")?,
        status: RunStatus::from_str(&status).map_err(|e| corrupt(&key, e))?,
    })
}
