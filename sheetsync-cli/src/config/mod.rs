//! Configuration file loading
//!
//! Settings live in one TOML file with named `[database.*]` and `[sheets.*]`
//! profiles plus `[pipeline]`, `[loader]` and `[report]` sections. The file is
//! read once at startup.

mod profiles;

pub use profiles::{DatabaseDriver, DatabaseProfile, SheetsKind, SheetsProfile};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::load::{BatchFailurePolicy, DEFAULT_CHUNK_SIZE, LoadOptions, Sanitizer};
use crate::pipeline::ErrorMode;

/// Environment variable that points at the config file
pub const CONFIG_ENV: &str = "SHEETSYNC_CONFIG";

/// Parsed configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: BTreeMap<String, DatabaseProfile>,
    pub sheets: BTreeMap<String, SheetsProfile>,
    pub pipeline: PipelineConfig,
    pub loader: LoaderConfig,
    pub report: ReportConfig,
}

/// `[pipeline]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Database profile name
    pub database: Option<String>,
    /// Sheets profile name
    pub sheets: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub schema: String,
    pub messages_worksheet: String,
    pub statuses_worksheet: String,
    pub on_error: ErrorMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: None,
            sheets: None,
            spreadsheet_id: None,
            schema: "whatsapp_data".to_string(),
            messages_worksheet: "Messages".to_string(),
            statuses_worksheet: "Statuses".to_string(),
            on_error: ErrorMode::default(),
        }
    }
}

/// `[loader]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub chunk_size: usize,
    pub refresh: bool,
    pub on_batch_error: BatchFailurePolicy,
    /// Replacement for `'` in values; an empty string keeps quotes
    pub quote_replacement: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            refresh: false,
            on_batch_error: BatchFailurePolicy::default(),
            quote_replacement: "\"".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::builder()
            .refresh(self.refresh)
            .chunk_size(self.chunk_size)
            .on_batch_error(self.on_batch_error)
            .build()
    }

    pub fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new().quote_replacement(self.quote_replacement.chars().next())
    }
}

/// `[report]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Reference date for the time windows; today when unset
    pub as_of: Option<NaiveDate>,
    /// Write the summaries to this `.xlsx` file
    pub output: Option<PathBuf>,
}

impl Config {
    /// Locate and parse the configuration file
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::locate(explicit) else {
            bail!(
                "No configuration file found. Pass --config, set ${}, or create {}",
                CONFIG_ENV,
                Self::candidates()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            );
        };

        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Failed to parse TOML")?;
        Ok(config)
    }

    /// First existing file among the lookup locations. An explicit path is
    /// returned even if it does not exist so the read error names it.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::candidates().into_iter().find(|p| p.is_file())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config").join("sheetsync.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sheetsync").join("config.toml"));
        }
        paths
    }

    /// Database profile by name, falling back to `[pipeline].database` and
    /// then to the only profile defined
    pub fn database_profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a DatabaseProfile)> {
        let (name, profile) = pick_profile(
            "database",
            &self.database,
            name.or(self.pipeline.database.as_deref()),
        )?;
        profile.validate(name)?;
        Ok((name, profile))
    }

    /// Sheets profile by name, with the same fallbacks as databases
    pub fn sheets_profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a SheetsProfile)> {
        let (name, profile) = pick_profile(
            "sheets",
            &self.sheets,
            name.or(self.pipeline.sheets.as_deref()),
        )?;
        profile.validate(name)?;
        Ok((name, profile))
    }
}

fn pick_profile<'a, T>(
    section: &str,
    profiles: &'a BTreeMap<String, T>,
    wanted: Option<&'a str>,
) -> Result<(&'a str, &'a T)> {
    match wanted {
        Some(name) => profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                anyhow!(
                    "No [{}.{}] profile in config. Known: {}",
                    section,
                    name,
                    known(profiles)
                )
            }),
        None => match profiles.len() {
            1 => profiles
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| anyhow!("No [{}.*] profile in config", section)),
            0 => bail!("No [{}.*] profile in config", section),
            _ => bail!(
                "Several [{}.*] profiles defined, choose one of: {}",
                section,
                known(profiles)
            ),
        },
    }
}

fn known<T>(profiles: &BTreeMap<String, T>) -> String {
    profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
