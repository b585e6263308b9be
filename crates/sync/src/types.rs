use std::io;

use honey_core::ServiceError;
use serde::Serialize;
use thiserror::Error;

use crate::query::QueryError;

/// Errors emitted by the sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that end one aggregation run.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("step {step}: {source}")]
    Query {
        step: String,
        #[source]
        source: QueryError,
    },
    #[error("step {step}: publishing result of {execution_id} failed: {source}")]
    Publish {
        step: String,
        execution_id: String,
        #[source]
        source: ServiceError,
    },
}

/// Ledger pass summary for one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_published: usize,
    pub files_failed: usize,
    pub nul_bytes_removed: usize,
    pub issues: Vec<SyncIssue>,
}

/// Non-fatal issues encountered during a tick.
#[derive(Debug, Clone, Serialize)]
pub struct SyncIssue {
    pub file_path: String,
    pub message: String,
}

impl SyncIssue {
    pub fn new(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            message: message.into(),
        }
    }
}
