//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use crate::config::{Config, SheetsKind, SheetsProfile};
use commands::load::LoadCommands;
use commands::query::QueryCommands;
use commands::run::RunCommands;

/// Load spreadsheet worksheets into a relational store and report on them
#[derive(Parser, Debug)]
#[command(name = "sheetsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $SHEETSYNC_CONFIG, ./config/sheetsync.toml,
    /// then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline (default)
    Run(RunCommands),
    /// Load one worksheet into one table
    Load(LoadCommands),
    /// Run a query and print the result
    Query(QueryCommands),
}

/// Run the selected command
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::handle_run_command(&config, args).await,
        None => commands::run::handle_run_command(&config, RunCommands::default()).await,
        Some(Commands::Load(args)) => commands::load::handle_load_command(&config, args).await,
        Some(Commands::Query(args)) => commands::query::handle_query_command(&config, args).await,
    }
}

/// Where a sheets profile reads from: an explicit override, the profile's
/// own path, or the pipeline's spreadsheet id
pub fn resolve_document(
    config: &Config,
    profile: &SheetsProfile,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(document) = explicit {
        return Ok(document.to_string());
    }
    if profile.kind != SheetsKind::Api {
        if let Some(path) = &profile.path {
            return Ok(path.clone());
        }
    }
    config
        .pipeline
        .spreadsheet_id
        .clone()
        .ok_or_else(|| {
            anyhow!("No spreadsheet configured. Set [pipeline].spreadsheet_id or the sheets profile's path")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_to_run() {
        let cli = Cli::try_parse_from(["sheetsync", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "sheetsync",
            "run",
            "--stage",
            "create-tables,ingest",
            "--refresh",
            "--chunk-size",
            "500",
        ])
        .unwrap();

        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(
            args.stages,
            vec![
                crate::pipeline::Stage::CreateTables,
                crate::pipeline::Stage::Ingest
            ]
        );
        assert!(args.refresh);
        assert_eq!(args.chunk_size, Some(500));
    }

    #[test]
    fn test_parse_query_with_global_config() {
        let cli = Cli::try_parse_from([
            "sheetsync",
            "query",
            "SELECT 1",
            "--format",
            "json",
            "--config",
            "other.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
        assert!(matches!(cli.command, Some(Commands::Query(_))));
    }

    #[test]
    fn test_resolve_document() {
        let mut config = Config::default();
        let workbook = SheetsProfile {
            kind: SheetsKind::Workbook,
            access_token: None,
            access_token_env: None,
            api_key: None,
            endpoint: None,
            path: Some("book.xlsx".to_string()),
        };
        assert_eq!(resolve_document(&config, &workbook, None).unwrap(), "book.xlsx");
        assert_eq!(
            resolve_document(&config, &workbook, Some("other.xlsx")).unwrap(),
            "other.xlsx"
        );

        let api = SheetsProfile {
            kind: SheetsKind::Api,
            path: None,
            ..workbook
        };
        assert!(resolve_document(&config, &api, None).is_err());
        config.pipeline.spreadsheet_id = Some("abc".to_string());
        assert_eq!(resolve_document(&config, &api, None).unwrap(), "abc");
    }
}
