//! Pipeline driver
//!
//! Runs the stages in a fixed order: create the tables, ingest the
//! worksheets, count the joined view, validate, and report. Each stage prints
//! a progress line before it starts and a completion line when it ends.

pub mod checks;
pub mod export;
pub mod ingest;
pub mod report;
pub mod schema;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use colored::*;
use log::{error, info};
use serde::Deserialize;

use crate::config::Config;
use crate::db::Executor;
use crate::load::{LoadOptions, LoadReport, Sanitizer};
use crate::source::TabularSource;
use checks::{CheckResult, TransformSummary};
use export::ExportData;
use ingest::IngestJob;
use report::ReportSummary;
use schema::TargetTables;

/// One step of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Stage {
    CreateTables,
    Ingest,
    Transform,
    Validate,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::CreateTables,
        Stage::Ingest,
        Stage::Transform,
        Stage::Validate,
        Stage::Report,
    ];

    fn progress(&self) -> &'static str {
        match self {
            Stage::CreateTables => "Creating tables",
            Stage::Ingest => "Ingesting worksheets",
            Stage::Transform => "Running transformations",
            Stage::Validate => "Running validations",
            Stage::Report => "Building report",
        }
    }

    fn done(&self) -> &'static str {
        match self {
            Stage::CreateTables => "Tables created",
            Stage::Ingest => "Data ingested",
            Stage::Transform => "Transformation done",
            Stage::Validate => "Validations complete",
            Stage::Report => "Report complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CreateTables => "create-tables",
            Stage::Ingest => "ingest",
            Stage::Transform => "transform",
            Stage::Validate => "validate",
            Stage::Report => "report",
        };
        write!(f, "{}", name)
    }
}

/// What the driver does when a stage fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Stop at the first failing stage
    #[default]
    Abort,
    /// Report the failure and run the remaining stages
    Continue,
}

/// Everything the stages need besides the executor and the source
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Spreadsheet id, workbook path or CSV directory
    pub document: String,
    pub tables: TargetTables,
    pub messages_worksheet: String,
    pub statuses_worksheet: String,
    pub on_error: ErrorMode,
    pub load: LoadOptions,
    pub sanitizer: Sanitizer,
    pub as_of: NaiveDate,
    pub output: Option<PathBuf>,
}

impl PipelineSettings {
    /// Settings from the config file. `document` is the resolved spreadsheet
    /// location.
    pub fn from_config(config: &Config, document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            tables: TargetTables::new(config.pipeline.schema.clone()),
            messages_worksheet: config.pipeline.messages_worksheet.clone(),
            statuses_worksheet: config.pipeline.statuses_worksheet.clone(),
            on_error: config.pipeline.on_error,
            load: config.loader.load_options(),
            sanitizer: config.loader.sanitizer(),
            as_of: config
                .report
                .as_of
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            output: config.report.output.clone(),
        }
    }

    fn ingest_jobs(&self) -> Vec<IngestJob> {
        vec![
            IngestJob {
                worksheet: self.messages_worksheet.clone(),
                table: self.tables.messages(),
            },
            IngestJob {
                worksheet: self.statuses_worksheet.clone(),
                table: self.tables.statuses(),
            },
        ]
    }
}

/// What a run produced
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<Stage>,
    /// Stages that failed under `ErrorMode::Continue`
    pub failed: Vec<(Stage, String)>,
    pub loads: Vec<LoadReport>,
    pub transform: Option<TransformSummary>,
    pub checks: Vec<CheckResult>,
    pub report: Option<ReportSummary>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives the stages against one executor and one source
pub struct Pipeline<'a> {
    executor: &'a dyn Executor,
    source: &'a dyn TabularSource,
    settings: PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        source: &'a dyn TabularSource,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            executor,
            source,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run `stages` (all when empty) in pipeline order
    pub async fn run(&self, stages: &[Stage]) -> Result<RunSummary> {
        let wanted: BTreeSet<Stage> = if stages.is_empty() {
            Stage::ALL.into_iter().collect()
        } else {
            stages.iter().copied().collect()
        };
        let total = wanted.len();
        let mut summary = RunSummary::default();

        for (step, stage) in wanted.into_iter().enumerate() {
            println!(
                "{} {}...",
                format!("Step {}/{}:", step + 1, total).bold(),
                stage.progress()
            );

            match self.run_stage(stage, &mut summary).await {
                Ok(lines) => {
                    for line in lines {
                        println!("  {}", line);
                    }
                    println!("{} {}\n", "✓".bright_green(), stage.done().bright_green());
                    summary.completed.push(stage);
                }
                Err(err) => {
                    println!("{} {} failed: {:#}\n", "✗".bright_red(), stage, err);
                    match self.settings.on_error {
                        ErrorMode::Abort => {
                            return Err(err.context(format!("Stage '{}' failed", stage)));
                        }
                        ErrorMode::Continue => {
                            error!("Stage '{}' failed, continuing: {:#}", stage, err);
                            summary.failed.push((stage, format!("{:#}", err)));
                        }
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn run_stage(&self, stage: Stage, summary: &mut RunSummary) -> Result<Vec<String>> {
        let settings = &self.settings;
        match stage {
            Stage::CreateTables => {
                for statement in settings.tables.create_statements(self.executor.dialect()) {
                    self.executor
                        .execute(&statement)
                        .await
                        .with_context(|| format!("Failed to run {}", statement.verb()))?;
                }
                Ok(vec![
                    format!("{} ready", settings.tables.messages()),
                    format!("{} ready", settings.tables.statuses()),
                ])
            }
            Stage::Ingest => {
                let reports = ingest::ingest(
                    self.executor,
                    self.source,
                    &settings.document,
                    &settings.ingest_jobs(),
                    &settings.sanitizer,
                    &settings.load,
                )
                .await?;
                let lines = reports
                    .iter()
                    .map(|r| format!("{} loaded with {} rows", r.table, r.rows_loaded))
                    .collect();
                summary.loads = reports;
                Ok(lines)
            }
            Stage::Transform => {
                let counts = checks::transform(self.executor, &settings.tables).await?;
                summary.transform = Some(counts);
                Ok(vec![
                    format!("Joined message/status rows: {}", counts.joined_rows),
                    format!("Duplicate records: {}", counts.duplicate_rows),
                ])
            }
            Stage::Validate => {
                let results = checks::validate(self.executor, &settings.tables).await?;
                let lines = results
                    .iter()
                    .map(|r| {
                        let mark = if r.passed() {
                            "ok".green()
                        } else {
                            "found".yellow()
                        };
                        format!("{} {}: {} {}", mark, r.name, r.offending, r.description)
                    })
                    .collect();
                summary.checks = results;
                Ok(lines)
            }
            Stage::Report => {
                let built = report::build(self.executor, &settings.tables, settings.as_of).await?;
                let mut lines = report::describe(&built);

                if let Some(path) = &settings.output {
                    export::write_report_excel(
                        &ExportData {
                            report: Some(&built),
                            transform: summary.transform.as_ref(),
                            checks: &summary.checks,
                        },
                        path,
                    )?;
                    info!("Report written to {}", path.display());
                    lines.push(format!("Written to {}", path.display()));
                }

                summary.report = Some(built);
                Ok(lines)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Dialect;
    use crate::table::Table;
    use crate::testing::FakeExecutor;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl TabularSource for EmptySource {
        async fn read(&self, _document: &str, _worksheet: &str) -> Result<Table> {
            Ok(Table::default())
        }
    }

    fn settings(on_error: ErrorMode) -> PipelineSettings {
        let mut config = Config::default();
        config.pipeline.schema = "main".to_string();
        config.pipeline.on_error = on_error;
        config.report.as_of = NaiveDate::from_ymd_opt(2024, 4, 22);
        PipelineSettings::from_config(&config, "doc")
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["create-tables", "ingest", "transform", "validate", "report"]
        );
        assert_eq!(
            Stage::from_str("create-tables", true).unwrap(),
            Stage::CreateTables
        );
    }

    #[tokio::test]
    async fn test_selected_stages_run_in_order() {
        let exec = FakeExecutor::new(Dialect::Sqlite);
        let pipeline = Pipeline::new(&exec, &EmptySource, settings(ErrorMode::Abort));

        let summary = pipeline
            .run(&[Stage::Validate, Stage::CreateTables])
            .await
            .unwrap();

        assert_eq!(summary.completed, vec![Stage::CreateTables, Stage::Validate]);
        assert_eq!(exec.executed().len(), 2);
        assert_eq!(summary.checks.len(), 4);
    }

    #[tokio::test]
    async fn test_abort_stops_at_failing_stage() {
        let exec = FakeExecutor::new(Dialect::Sqlite).fail_execute(0);
        let pipeline = Pipeline::new(&exec, &EmptySource, settings(ErrorMode::Abort));

        let err = pipeline.run(&[]).await.unwrap_err();
        assert!(err.to_string().contains("create-tables"));
        assert!(exec.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_continue_runs_remaining_stages() {
        let exec = FakeExecutor::new(Dialect::Sqlite).fail_execute(0);
        let pipeline = Pipeline::new(&exec, &EmptySource, settings(ErrorMode::Continue));

        let summary = pipeline.run(&[]).await.unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, Stage::CreateTables);
        assert_eq!(
            summary.completed,
            vec![Stage::Ingest, Stage::Transform, Stage::Validate, Stage::Report]
        );
        assert!(summary.report.is_some());
    }
}
