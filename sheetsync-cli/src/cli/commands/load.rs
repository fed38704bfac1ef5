//! `sheetsync load`

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;

use crate::config::Config;
use crate::load::{BatchFailurePolicy, BulkLoader};
use crate::{db, source};

#[derive(Args, Debug)]
pub struct LoadCommands {
    /// Worksheet to read
    pub worksheet: String,

    /// Target table, optionally schema-qualified
    pub table: String,

    /// Spreadsheet id, workbook path or CSV directory
    #[arg(long)]
    pub document: Option<String>,

    /// Clear the table before loading
    #[arg(long)]
    pub refresh: bool,

    /// Rows per insert statement
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// What to do when a batch is rejected
    #[arg(long, value_enum)]
    pub on_batch_error: Option<BatchFailurePolicy>,

    /// Database profile
    #[arg(long)]
    pub database: Option<String>,

    /// Sheets profile
    #[arg(long)]
    pub sheets: Option<String>,
}

pub async fn handle_load_command(config: &Config, args: LoadCommands) -> Result<()> {
    let (_, db_profile) = config.database_profile(args.database.as_deref())?;
    let (_, sheets_profile) = config.sheets_profile(args.sheets.as_deref())?;
    let document =
        crate::cli::resolve_document(config, sheets_profile, args.document.as_deref())?;

    let mut options = config.loader.load_options();
    options.refresh |= args.refresh;
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    if let Some(policy) = args.on_batch_error {
        options.on_batch_error = policy;
    }

    let table = source::open(sheets_profile)?
        .read(&document, &args.worksheet)
        .await
        .with_context(|| format!("Failed to read worksheet '{}'", args.worksheet))?;

    let executor = db::connect(db_profile).await?;
    let result = BulkLoader::new(executor.as_ref())
        .with_sanitizer(config.loader.sanitizer())
        .load(&table, &args.table, &options)
        .await;
    executor.close().await;

    let report = result?;
    println!(
        "{} loaded with {} of {} rows",
        report.table.bright_green(),
        report.rows_loaded,
        report.rows_total
    );
    if !report.is_complete() {
        for batch in report.failed_batches() {
            eprintln!(
                "{} batch {} ({} rows): {}",
                "rejected".bright_red(),
                batch.index + 1,
                batch.rows,
                batch.error.as_deref().unwrap_or_default()
            );
        }
        bail!("{} rows were not loaded", report.rows_failed());
    }
    Ok(())
}
