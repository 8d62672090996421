// src/error.rs
//! Pipeline error taxonomy.
//!
//! Per-record and per-source failures (`SkippedRecord`, `SourceUnavailable`)
//! are recovered by the collector and only show up in run counts.
//! `StorageUnavailable` and `Configuration` propagate to the caller.

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("skipped record from {source_name}: {reason}")]
    SkippedRecord { source_name: String, reason: String },

    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: String,
        reason: String,
    },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn skipped(source: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::SkippedRecord {
            source_name: source.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::SourceUnavailable {
            source_name: source.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that end the run (as opposed to being skipped).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::StorageUnavailable(_) | PipelineError::Configuration(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database path: {0}")]
    Io(#[from] std::io::Error),

    #[error("article {id} rejected: {reason}")]
    Rejected { id: String, reason: String },

    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(!PipelineError::skipped("Feed", "no title").is_fatal());
        assert!(!PipelineError::unavailable("Feed", "timeout").is_fatal());
        assert!(PipelineError::Configuration("empty taxonomy".into()).is_fatal());
        let storage = StorageError::Rejected {
            id: "x".into(),
            reason: "none".into(),
        };
        assert!(PipelineError::from(storage).is_fatal());
    }

    #[test]
    fn messages_name_the_source() {
        let e = PipelineError::unavailable("Cleveland.com", "HTTP 503");
        assert_eq!(e.to_string(), "source Cleveland.com unavailable: HTTP 503");
    }
}
