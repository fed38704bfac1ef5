//! Local spreadsheet files (`.xlsx`, `.xls`, `.ods`)

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::{TabularSource, grid_to_table};
use crate::table::{Cell, Table};

/// Reads worksheets from a workbook file; the document is the file path
#[derive(Debug, Clone, Default)]
pub struct WorkbookSource;

impl WorkbookSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TabularSource for WorkbookSource {
    async fn read(&self, document: &str, worksheet: &str) -> Result<Table> {
        let path = document.to_string();
        let sheet = worksheet.to_string();
        tokio::task::spawn_blocking(move || read_sheet(Path::new(&path), &sheet))
            .await
            .context("Workbook reader task failed")?
    }
}

/// Read one sheet synchronously
pub fn read_sheet(path: &Path, worksheet: &str) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    if !workbook.sheet_names().iter().any(|name| name == worksheet) {
        anyhow::bail!(
            "Workbook {} has no sheet '{}' (found: {})",
            path.display(),
            worksheet,
            workbook.sheet_names().join(", ")
        );
    }

    let range = workbook
        .worksheet_range(worksheet)
        .with_context(|| format!("Failed to read sheet: {}", worksheet))?;

    let grid = range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();
    Ok(grid_to_table(grid))
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Text(String::new()),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Float(dt.as_f64()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Cell::Timestamp)
            .unwrap_or(Cell::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Convert an Excel serial day number (1900 date system) to a timestamp
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_serial_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(excel_serial_to_datetime(45384.5), Some(expected));
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_read_written_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Messages").unwrap();
        sheet.write_string(0, 0, "Id").unwrap();
        sheet.write_string(0, 1, "Content").unwrap();
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "hello").unwrap();
        sheet.write_number(2, 0, 2.0).unwrap();
        workbook.save(&path).unwrap();

        let table = read_sheet(&path, "Messages").unwrap();
        assert_eq!(table.columns(), ["Id", "Content"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Id").and_then(Cell::as_int), Some(1));
        assert_eq!(table.get(0, "Content"), Some(&Cell::from("hello")));
        assert_eq!(table.get(1, "Content"), Some(&Cell::from("")));
    }

    #[test]
    fn test_missing_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Other").unwrap();
        workbook.save(&path).unwrap();

        let err = read_sheet(&path, "Statuses").unwrap_err();
        assert!(err.to_string().contains("Statuses"));
    }
}
