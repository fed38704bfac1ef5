//! Spreadsheet readers
//!
//! Every reader turns one worksheet into a [`Table`]: the first row is the
//! header, shorter rows are padded with empty text and longer rows are cut to
//! the header width.

mod csv_dir;
mod sheets_api;
mod workbook;

pub use csv_dir::CsvSource;
pub use sheets_api::SheetsApiSource;
pub use workbook::WorkbookSource;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{SheetsKind, SheetsProfile};
use crate::table::{Cell, Table};

/// Reads worksheets out of spreadsheet documents
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Read `worksheet` from `document`. What a document is depends on the
    /// source: a spreadsheet id, a workbook path, or a directory.
    async fn read(&self, document: &str, worksheet: &str) -> Result<Table>;
}

/// Build the reader a sheets profile describes
pub fn open(profile: &SheetsProfile) -> Result<Box<dyn TabularSource>> {
    let source: Box<dyn TabularSource> = match profile.kind {
        SheetsKind::Api => Box::new(
            SheetsApiSource::from_profile(profile).context("Failed to set up Sheets API client")?,
        ),
        SheetsKind::Workbook => Box::new(WorkbookSource::new()),
        SheetsKind::Csv => Box::new(CsvSource::new()),
    };
    Ok(source)
}

/// Turn a row-major grid into a table, using the first row as the header
pub fn grid_to_table(grid: Vec<Vec<Cell>>) -> Table {
    let mut rows = grid.into_iter();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let columns: Vec<String> = header.iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let body = rows
        .map(|mut row| {
            row.resize(width, Cell::Text(String::new()));
            row
        })
        .collect();

    Table::from_parts_unchecked(columns, body)
}
