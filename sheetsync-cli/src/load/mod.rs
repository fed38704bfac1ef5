//! Bulk loading of tables into the relational store
//!
//! The loader sanitizes a [`Table`](crate::table::Table), optionally clears the
//! target, and writes rows in ordered batches, one parameterized multi-row
//! `INSERT` per batch.

mod batch;
mod loader;
mod options;
mod sanitize;

pub use batch::{InsertBuilder, effective_chunk_size};
pub use loader::BulkLoader;
pub use options::{BatchFailurePolicy, DEFAULT_CHUNK_SIZE, LoadOptions, LoadOptionsBuilder};
pub use sanitize::{DEFAULT_MISSING_MARKERS, Sanitizer};

use serde::Serialize;
use thiserror::Error;

use crate::db::ExecError;

/// Failures that stop a load
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("column '{0}' appears more than once after sanitizing")]
    DuplicateColumn(String),

    #[error("{columns} columns exceed the {limit} bind parameters one statement may carry")]
    TooManyColumns { columns: usize, limit: usize },

    #[error("could not read the layout of {table}: {source}")]
    Describe {
        table: String,
        #[source]
        source: ExecError,
    },

    #[error("clearing {table} failed, nothing was inserted: {source}")]
    Refresh {
        table: String,
        #[source]
        source: ExecError,
    },

    #[error("batch {batch} into {table} failed after {rows_loaded} rows were loaded: {source}")]
    BatchAborted {
        table: String,
        batch: usize,
        rows_loaded: usize,
        #[source]
        source: ExecError,
    },
}

/// What happened to one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// 0-based position of the batch
    pub index: usize,
    /// Rows in the batch
    pub rows: usize,
    /// Error text if the batch was rejected
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one load
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub table: String,
    /// Rows in the input
    pub rows_total: usize,
    /// Rows in batches the store accepted
    pub rows_loaded: usize,
    /// Whether a clearing statement was issued
    pub refreshed: bool,
    /// Chunk size actually used (may be lower than requested)
    pub chunk_size: usize,
    pub batches: Vec<BatchOutcome>,
}

impl LoadReport {
    /// Report for a load that had nothing to do
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows_total: 0,
            rows_loaded: 0,
            refreshed: false,
            chunk_size: 0,
            batches: Vec::new(),
        }
    }

    /// True when every batch was accepted
    pub fn is_complete(&self) -> bool {
        self.rows_loaded == self.rows_total
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| !b.is_success())
    }

    pub fn rows_failed(&self) -> usize {
        self.failed_batches().map(|b| b.rows).sum()
    }
}
