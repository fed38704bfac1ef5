//! Directory of CSV exports, one file per worksheet

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{TabularSource, grid_to_table};
use crate::table::{Cell, Table};

/// Reads `<document>/<worksheet>.csv`
#[derive(Debug, Clone, Default)]
pub struct CsvSource;

impl CsvSource {
    pub fn new() -> Self {
        Self
    }

    /// File that holds `worksheet` inside `dir`
    pub fn worksheet_path(dir: &Path, worksheet: &str) -> PathBuf {
        dir.join(format!("{}.csv", worksheet))
    }
}

#[async_trait]
impl TabularSource for CsvSource {
    async fn read(&self, document: &str, worksheet: &str) -> Result<Table> {
        let path = Self::worksheet_path(Path::new(document), worksheet);
        tokio::task::spawn_blocking(move || read_csv(&path))
            .await
            .context("CSV reader task failed")?
    }
}

/// Read a CSV file; the first record is the header
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut grid = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed to read record {} of {}", i + 1, path.display()))?;
        grid.push(record.iter().map(Cell::from).collect());
    }
    Ok(grid_to_table(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_read_worksheet_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Statuses.csv"),
            "Message Id,Status,Note\n1,sent,\"it's, quoted\"\n2,read\n",
        )
        .unwrap();

        let table = CsvSource::new()
            .read(dir.path().to_str().unwrap(), "Statuses")
            .await
            .unwrap();

        assert_eq!(table.columns(), ["Message Id", "Status", "Note"]);
        assert_eq!(table.get(0, "Note"), Some(&Cell::from("it's, quoted")));
        assert_eq!(table.get(1, "Note"), Some(&Cell::from("")));
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvSource::new()
            .read(dir.path().to_str().unwrap(), "Messages")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Messages.csv"));
    }
}
