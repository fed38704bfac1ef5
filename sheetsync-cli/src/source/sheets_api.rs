//! Google Sheets values API reader

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{TabularSource, grid_to_table};
use crate::config::SheetsProfile;
use crate::table::{Cell, Table};

const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com";

/// How requests authenticate
#[derive(Debug, Clone)]
enum Credentials {
    Bearer(String),
    ApiKey(String),
}

/// Reads worksheets through `GET /v4/spreadsheets/{id}/values/{range}`
#[derive(Debug, Clone)]
pub struct SheetsApiSource {
    client: Client,
    endpoint: String,
    credentials: Credentials,
}

/// Body of a values response. `values` is absent for empty sheets.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsApiSource {
    pub fn from_profile(profile: &SheetsProfile) -> Result<Self> {
        let credentials = match (profile.resolve_access_token(), &profile.api_key) {
            (Some(token), _) => Credentials::Bearer(token),
            (None, Some(key)) => Credentials::ApiKey(key.clone()),
            (None, None) => bail!("No access token or API key configured"),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: profile
                .endpoint
                .as_deref()
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            credentials,
        })
    }

    fn values_url(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid Sheets endpoint: {}", self.endpoint))?;
        let range = sheet_range(worksheet);
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets endpoint cannot carry a path: {}", self.endpoint))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        if let Credentials::ApiKey(key) = &self.credentials {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

/// A1 range covering a whole worksheet
fn sheet_range(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

fn parse_values(body: &str) -> Result<Table> {
    let range: ValueRange =
        serde_json::from_str(body).context("Failed to parse Sheets values response")?;

    let grid = range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(json_to_cell).collect())
        .collect();
    Ok(grid_to_table(grid))
}

fn json_to_cell(value: serde_json::Value) -> Cell {
    match value {
        serde_json::Value::String(s) => Cell::Text(s),
        serde_json::Value::Null => Cell::Text(String::new()),
        other => Cell::Text(other.to_string()),
    }
}

#[async_trait]
impl TabularSource for SheetsApiSource {
    async fn read(&self, document: &str, worksheet: &str) -> Result<Table> {
        let url = self.values_url(document, worksheet)?;
        debug!("Fetching worksheet '{}' from spreadsheet {}", worksheet, document);

        let mut request = self.client.get(url);
        if let Credentials::Bearer(token) = &self.credentials {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to request worksheet '{}'", worksheet))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response for worksheet '{}'", worksheet))?;
        if !status.is_success() {
            bail!(
                "Sheets API returned {} for worksheet '{}': {}",
                status,
                worksheet,
                body
            );
        }

        parse_values(&body).with_context(|| format!("Worksheet '{}'", worksheet))
    }
}
