//! `sheetsync run`

use anyhow::{Result, bail};
use clap::Args;
use colored::*;

use crate::config::Config;
use crate::pipeline::{ErrorMode, Pipeline, PipelineSettings, Stage};
use crate::{db, source};

#[derive(Args, Debug, Default)]
pub struct RunCommands {
    /// Only run these stages (comma separated)
    #[arg(long = "stage", value_enum, value_delimiter = ',')]
    pub stages: Vec<Stage>,

    /// Clear each table before loading
    #[arg(long)]
    pub refresh: bool,

    /// Rows per insert statement
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Override [pipeline].on_error
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorMode>,

    /// Database profile
    #[arg(long)]
    pub database: Option<String>,

    /// Sheets profile
    #[arg(long)]
    pub sheets: Option<String>,
}

pub async fn handle_run_command(config: &Config, args: RunCommands) -> Result<()> {
    let (db_name, db_profile) = config.database_profile(args.database.as_deref())?;
    let (_, sheets_profile) = config.sheets_profile(args.sheets.as_deref())?;
    let document = crate::cli::resolve_document(config, sheets_profile, None)?;

    let mut settings = PipelineSettings::from_config(config, document);
    if args.refresh {
        settings.load.refresh = true;
    }
    if let Some(chunk_size) = args.chunk_size {
        settings.load.chunk_size = chunk_size;
    }
    if let Some(mode) = args.on_error {
        settings.on_error = mode;
    }

    println!(
        "Using database {} ({})",
        db_name.bright_green().bold(),
        db_profile.display_target().dimmed()
    );

    let source = source::open(sheets_profile)?;
    let executor = db::connect(db_profile).await?;

    let result = Pipeline::new(executor.as_ref(), source.as_ref(), settings)
        .run(&args.stages)
        .await;
    executor.close().await;

    let summary = result?;
    if !summary.is_success() {
        for (stage, err) in &summary.failed {
            eprintln!("{} {}: {}", "failed".bright_red(), stage, err);
        }
        bail!("{} of the pipeline stages failed", summary.failed.len());
    }
    Ok(())
}
