//! Loader settings with builder

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default rows per insert statement
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// What the loader does when the store rejects a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailurePolicy {
    /// Log the failure, record it in the report, move on to the next batch
    #[default]
    Continue,
    /// Stop at the first rejected batch
    Abort,
}

/// Settings for one bulk load
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Clear the target table before inserting
    pub refresh: bool,
    /// Maximum rows per insert statement
    pub chunk_size: usize,
    pub on_batch_error: BatchFailurePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            refresh: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_batch_error: BatchFailurePolicy::Continue,
        }
    }
}

impl LoadOptions {
    /// Create a new builder for LoadOptions
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::new()
    }
}

/// Builder for LoadOptions
#[derive(Debug)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: LoadOptions::default(),
        }
    }

    /// Clear the target before loading
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.options.refresh = refresh;
        self
    }

    /// Set rows per insert statement
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.options.chunk_size = chunk_size;
        self
    }

    /// Set the batch failure policy
    pub fn on_batch_error(mut self, policy: BatchFailurePolicy) -> Self {
        self.options.on_batch_error = policy;
        self
    }

    /// Build the final options
    pub fn build(self) -> LoadOptions {
        self.options
    }
}

impl Default for LoadOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
