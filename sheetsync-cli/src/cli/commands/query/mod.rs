//! `sheetsync query`

mod handler;

pub use handler::handle_query_command;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

#[derive(Args, Debug)]
pub struct QueryCommands {
    /// SQL to run
    pub query: Option<String>,

    /// Read the SQL from a file instead
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Database profile
    #[arg(long)]
    pub database: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    /// Pretty-printed array of records
    Json,
    /// One-line array of records
    JsonCompact,
}
