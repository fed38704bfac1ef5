//! The bulk loader

use std::collections::HashSet;

use log::{debug, error, info, warn};

use super::batch::{InsertBuilder, effective_chunk_size};
use super::{BatchFailurePolicy, BatchOutcome, LoadError, LoadOptions, LoadReport, Sanitizer};
use crate::db::{Executor, Statement};
use crate::table::Table;

/// Writes tables into existing relational tables, batch by batch
pub struct BulkLoader<'e> {
    executor: &'e dyn Executor,
    sanitizer: Sanitizer,
}

impl<'e> BulkLoader<'e> {
    pub fn new(executor: &'e dyn Executor) -> Self {
        Self {
            executor,
            sanitizer: Sanitizer::default(),
        }
    }

    /// Use a custom sanitizer
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Load `table` into `target`.
    ///
    /// The target must already exist. Rows are inserted in their original
    /// order; batches are independent, so a rejected batch does not undo
    /// earlier ones.
    pub async fn load(
        &self,
        table: &Table,
        target: &str,
        options: &LoadOptions,
    ) -> Result<LoadReport, LoadError> {
        if table.is_empty() {
            info!("No data to load into {}", target);
            return Ok(LoadReport::empty(target));
        }
        if options.chunk_size == 0 {
            return Err(LoadError::InvalidChunkSize);
        }

        let sanitized = self.sanitizer.sanitize(table);
        let columns = sanitized.columns();

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(LoadError::DuplicateColumn(dup.clone()));
        }

        let dialect = self.executor.dialect();
        if columns.len() > dialect.max_bind_params() {
            return Err(LoadError::TooManyColumns {
                columns: columns.len(),
                limit: dialect.max_bind_params(),
            });
        }

        let chunk_size = effective_chunk_size(options.chunk_size, columns.len(), dialect);
        if chunk_size < options.chunk_size {
            warn!(
                "{}: {} columns allow at most {} rows per statement, lowering chunk size from {}",
                target,
                columns.len(),
                chunk_size,
                options.chunk_size
            );
        }

        let casts = self.resolve_casts(target, columns).await?;
        let builder = InsertBuilder::new(dialect, target, columns, casts);

        if options.refresh {
            info!("Truncating {}...", target);
            self.executor
                .execute(&Statement::new(dialect.clear_table(target)))
                .await
                .map_err(|source| LoadError::Refresh {
                    table: target.to_string(),
                    source,
                })?;
        }

        let batch_count = sanitized.len().div_ceil(chunk_size);
        let mut report = LoadReport {
            table: target.to_string(),
            rows_total: sanitized.len(),
            rows_loaded: 0,
            refreshed: options.refresh,
            chunk_size,
            batches: Vec::with_capacity(batch_count),
        };

        for (index, rows) in sanitized.rows().chunks(chunk_size).enumerate() {
            debug!(
                "{}: batch {}/{} ({} rows)",
                target,
                index + 1,
                batch_count,
                rows.len()
            );

            let statement = builder.build(rows);
            match self.executor.execute(&statement).await {
                Ok(_) => {
                    report.rows_loaded += rows.len();
                    report.batches.push(BatchOutcome {
                        index,
                        rows: rows.len(),
                        error: None,
                    });
                }
                Err(err) => {
                    error!(
                        "{}: batch {}/{} rejected: {}",
                        target,
                        index + 1,
                        batch_count,
                        err
                    );
                    if options.on_batch_error == BatchFailurePolicy::Abort {
                        return Err(LoadError::BatchAborted {
                            table: target.to_string(),
                            batch: index,
                            rows_loaded: report.rows_loaded,
                            source: err,
                        });
                    }
                    report.batches.push(BatchOutcome {
                        index,
                        rows: rows.len(),
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        if report.is_complete() {
            info!("{} loaded with {} rows", target, report.rows_loaded);
        } else {
            warn!(
                "{} loaded with {} of {} rows ({} batches rejected)",
                target,
                report.rows_loaded,
                report.rows_total,
                report.failed_batches().count()
            );
        }

        Ok(report)
    }

    /// Per-column casts for dialects that bind text into typed columns
    async fn resolve_casts(
        &self,
        target: &str,
        columns: &[String],
    ) -> Result<Vec<Option<String>>, LoadError> {
        let dialect = self.executor.dialect();
        if !dialect.casts_parameters() {
            return Ok(vec![None; columns.len()]);
        }

        let described = self
            .executor
            .describe(target)
            .await
            .map_err(|source| LoadError::Describe {
                table: target.to_string(),
                source,
            })?;
        if described.is_empty() {
            warn!("{}: no column information found, binding values as text", target);
        }

        Ok(columns
            .iter()
            .map(|name| {
                described
                    .iter()
                    .find(|info| info.name == *name)
                    .and_then(|info| dialect.cast_type(&info.data_type, &info.udt_name))
            })
            .collect())
    }
}
