//! Worksheets into message tables

use anyhow::{Context, Result, bail};
use log::info;

use crate::db::Executor;
use crate::load::{BulkLoader, LoadOptions, LoadReport, Sanitizer};
use crate::source::TabularSource;

/// One worksheet bound for one table
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub worksheet: String,
    pub table: String,
}

/// Read each worksheet and load it into its table, in order.
///
/// A load that leaves rows behind counts as a failure.
pub async fn ingest(
    executor: &dyn Executor,
    source: &dyn TabularSource,
    document: &str,
    jobs: &[IngestJob],
    sanitizer: &Sanitizer,
    options: &LoadOptions,
) -> Result<Vec<LoadReport>> {
    let loader = BulkLoader::new(executor).with_sanitizer(sanitizer.clone());
    let mut reports = Vec::with_capacity(jobs.len());

    for job in jobs {
        let table = source
            .read(document, &job.worksheet)
            .await
            .with_context(|| format!("Failed to read worksheet '{}'", job.worksheet))?;
        info!(
            "Read {} rows from worksheet '{}'",
            table.len(),
            job.worksheet
        );

        let report = loader
            .load(&table, &job.table, options)
            .await
            .with_context(|| format!("Failed to load worksheet '{}'", job.worksheet))?;

        if !report.is_complete() {
            bail!(
                "{} rows of worksheet '{}' were rejected by {} ({} of {} batches failed)",
                report.rows_failed(),
                job.worksheet,
                job.table,
                report.failed_batches().count(),
                report.batches.len()
            );
        }
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Dialect;
    use crate::table::{Cell, Table};
    use crate::testing::FakeExecutor;
    use async_trait::async_trait;

    struct StaticSource(Table);

    #[async_trait]
    impl TabularSource for StaticSource {
        async fn read(&self, _document: &str, _worksheet: &str) -> Result<Table> {
            Ok(self.0.clone())
        }
    }

    fn jobs() -> Vec<IngestJob> {
        vec![
            IngestJob {
                worksheet: "Messages".to_string(),
                table: "msg_info".to_string(),
            },
            IngestJob {
                worksheet: "Statuses".to_string(),
                table: "msg_status".to_string(),
            },
        ]
    }

    fn source() -> StaticSource {
        StaticSource(
            Table::from_rows(
                ["Id", "Content"],
                vec![
                    vec![Cell::Int(1), Cell::from("a")],
                    vec![Cell::Int(2), Cell::from("b")],
                ],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ingest_loads_every_job() {
        let exec = FakeExecutor::new(Dialect::Sqlite);
        let reports = ingest(
            &exec,
            &source(),
            "doc",
            &jobs(),
            &Sanitizer::default(),
            &LoadOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].table, "msg_status");
        assert_eq!(exec.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_load_fails_stage() {
        let exec = FakeExecutor::new(Dialect::Sqlite).fail_execute(0);
        let options = LoadOptions::builder().chunk_size(1).build();

        let err = ingest(
            &exec,
            &source(),
            "doc",
            &jobs(),
            &Sanitizer::default(),
            &options,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("1 rows of worksheet 'Messages'"));
        // The second worksheet is never attempted
        assert_eq!(exec.executed().len(), 2);
    }
}
