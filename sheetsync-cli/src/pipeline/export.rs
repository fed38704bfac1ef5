//! Write report summaries to an Excel workbook

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::checks::{CheckResult, TransformSummary};
use super::report::{ReportSummary, STATUS_WINDOW_DAYS, USER_WINDOW_DAYS};

/// Everything a run produced that is worth keeping
#[derive(Debug, Default)]
pub struct ExportData<'a> {
    pub report: Option<&'a ReportSummary>,
    pub transform: Option<&'a TransformSummary>,
    pub checks: &'a [CheckResult],
}

/// Write one sheet per summary to `path`
pub fn write_report_excel(data: &ExportData<'_>, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let summary = workbook.add_worksheet();
    summary.set_name("Summary")?;
    write_header(summary, &header, &["Metric", "Value"])?;

    let mut metrics: Vec<(String, String)> = Vec::new();
    if let Some(report) = data.report {
        let fraction = &report.read_fraction;
        metrics.push(("As of".to_string(), report.as_of.to_string()));
        metrics.push((
            format!("Distinct users, last {} days", USER_WINDOW_DAYS),
            report.total_users.to_string(),
        ));
        metrics.push((
            "Outbound messages sent or read".to_string(),
            fraction.total.to_string(),
        ));
        metrics.push(("Outbound messages read".to_string(), fraction.read.to_string()));
        metrics.push((
            "Read fraction".to_string(),
            fraction
                .ratio()
                .map(|r| format!("{:.4}", r))
                .unwrap_or_default(),
        ));
        metrics.push((
            "Messages with time to read".to_string(),
            report.time_to_read.samples.to_string(),
        ));
    }
    if let Some(transform) = data.transform {
        metrics.push(("Joined rows".to_string(), transform.joined_rows.to_string()));
        metrics.push((
            "Duplicate rows".to_string(),
            transform.duplicate_rows.to_string(),
        ));
    }
    for (i, (name, value)) in metrics.iter().enumerate() {
        let row = (i + 1) as u32;
        summary.write_string(row, 0, name)?;
        summary.write_string(row, 1, value)?;
    }
    summary.set_column_width(0, 34)?;

    if let Some(report) = data.report {
        let hist = workbook.add_worksheet();
        hist.set_name("Time to read")?;
        write_header(hist, &header, &["From (s)", "To (s)", "Messages"])?;
        for (i, bin) in report.time_to_read.bins.iter().enumerate() {
            let row = (i + 1) as u32;
            hist.write_number(row, 0, bin.start)?;
            hist.write_number(row, 1, bin.end)?;
            hist.write_number(row, 2, bin.count as f64)?;
        }

        let status = workbook.add_worksheet();
        status.set_name(format!("Status last {} days", STATUS_WINDOW_DAYS))?;
        write_header(status, &header, &["Status", "Messages", "Share"])?;
        let total: i64 = report.status_distribution.iter().map(|s| s.messages).sum();
        for (i, share) in report.status_distribution.iter().enumerate() {
            let row = (i + 1) as u32;
            status.write_string(row, 0, &share.status)?;
            status.write_number(row, 1, share.messages as f64)?;
            if total > 0 {
                status.write_number(row, 2, share.messages as f64 / total as f64)?;
            }
        }
    }

    if !data.checks.is_empty() {
        let checks = workbook.add_worksheet();
        checks.set_name("Checks")?;
        write_header(checks, &header, &["Check", "Description", "Offending rows"])?;
        for (i, check) in data.checks.iter().enumerate() {
            let row = (i + 1) as u32;
            checks.write_string(row, 0, check.name)?;
            checks.write_string(row, 1, check.description)?;
            checks.write_number(row, 2, check.offending as f64)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;

    Ok(())
}

fn write_header(ws: &mut Worksheet, format: &Format, names: &[&str]) -> Result<()> {
    for (col, name) in names.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *name, format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::report::{Histogram, ReadFraction, StatusShare};
    use calamine::{Reader, open_workbook_auto};
    use chrono::NaiveDate;

    #[test]
    fn test_export_round_trips_through_calamine() {
        let report = ReportSummary {
            as_of: NaiveDate::from_ymd_opt(2024, 4, 22).unwrap(),
            total_users: 4,
            read_fraction: ReadFraction { read: 1, total: 2 },
            time_to_read: Histogram::build(&[60.0, 120.0], 30),
            status_distribution: vec![StatusShare {
                status: "read".to_string(),
                messages: 3,
            }],
        };
        let checks = vec![CheckResult {
            name: "orphan_statuses",
            description: "statuses whose message does not exist",
            offending: 0,
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_report_excel(
            &ExportData {
                report: Some(&report),
                transform: None,
                checks: &checks,
            },
            &path,
        )
        .unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Summary", "Time to read", "Status last 7 days", "Checks"]
        );
    }
}
