//! Named connection profiles for databases and spreadsheet sources

use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

/// Backend behind a database profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Postgres,
    Sqlite,
}

/// `[database.<name>]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseProfile {
    #[serde(default)]
    pub driver: DatabaseDriver,
    pub hostname: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Environment variable holding the password
    pub password_env: Option<String>,
    /// SQLite file, or `:memory:`
    pub path: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

impl DatabaseProfile {
    /// Profile for a SQLite database at `path`
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: DatabaseDriver::Sqlite,
            hostname: None,
            port: default_port(),
            database: None,
            username: None,
            password: None,
            password_env: None,
            path: Some(path.into()),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or("localhost")
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Inline password first, then the named environment variable
    pub fn resolve_password(&self) -> Option<String> {
        self.password.clone().or_else(|| {
            self.password_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }

    /// Connection target for messages; never includes the password
    pub fn display_target(&self) -> String {
        match self.driver {
            DatabaseDriver::Postgres => format!(
                "postgres://{}@{}:{}/{}",
                self.username.as_deref().unwrap_or(""),
                self.hostname(),
                self.port,
                self.database.as_deref().unwrap_or("")
            ),
            DatabaseDriver::Sqlite => {
                format!("sqlite:{}", self.path.as_deref().unwrap_or(":memory:"))
            }
        }
    }

    /// Check that everything needed to connect is present
    pub fn validate(&self, name: &str) -> Result<()> {
        match self.driver {
            DatabaseDriver::Postgres => {
                if self.database.is_none() {
                    bail!("Database profile '{}' has no 'database'", name);
                }
                if let Some(var) = &self.password_env {
                    if self.password.is_none() && std::env::var(var).is_err() {
                        bail!(
                            "Database profile '{}' reads its password from ${}, which is not set",
                            name,
                            var
                        );
                    }
                }
            }
            DatabaseDriver::Sqlite => {
                if self.path.is_none() {
                    bail!("SQLite profile '{}' has no 'path'", name);
                }
            }
        }
        if self.max_connections == 0 {
            bail!("Database profile '{}' needs max_connections >= 1", name);
        }
        Ok(())
    }
}

/// Where a sheets profile reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetsKind {
    /// Google Sheets values API
    Api,
    /// Local spreadsheet file
    Workbook,
    /// Directory of CSV files
    Csv,
}

/// `[sheets.<name>]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsProfile {
    pub kind: SheetsKind,
    pub access_token: Option<String>,
    pub access_token_env: Option<String>,
    pub api_key: Option<String>,
    /// Overrides the API base URL
    pub endpoint: Option<String>,
    /// Workbook file or CSV directory; the pipeline's spreadsheet id is used
    /// when absent
    pub path: Option<String>,
}

impl SheetsProfile {
    pub fn resolve_access_token(&self) -> Option<String> {
        self.access_token.clone().or_else(|| {
            self.access_token_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.kind == SheetsKind::Api
            && self.resolve_access_token().is_none()
            && self.api_key.is_none()
        {
            match &self.access_token_env {
                Some(var) => bail!(
                    "Sheets profile '{}' reads its access token from ${}, which is not set",
                    name,
                    var
                ),
                None => bail!(
                    "Sheets profile '{}' needs access_token, access_token_env or api_key",
                    name
                ),
            }
        }
        Ok(())
    }
}
