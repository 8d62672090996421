// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod relevance;
pub mod sections;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{PipelineError, Result, StorageError};
pub use crate::ingest::config;
pub use crate::ingest::{Collector, RunReport};
pub use crate::model::{Article, CollectionRun, OriginType, RelevanceLevel, RunStatus};
pub use crate::relevance::{KeywordTaxonomy, RelevanceScorer};
pub use crate::sections::{categorize, Section, SectionedArticles};
pub use crate::store::{ArticleQuery, ArticleStore, StoreStats};
