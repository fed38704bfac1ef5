//! Engagement summaries over the loaded message tables

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::checks::count;
use super::schema::TargetTables;
use crate::db::{Dialect, Executor, Statement};
use crate::table::{Cell, Table};

/// Days covered by the active-user count
pub const USER_WINDOW_DAYS: i64 = 180;
/// Days covered by the status distribution
pub const STATUS_WINDOW_DAYS: i64 = 7;
/// Buckets in the time-to-read histogram
pub const HISTOGRAM_BINS: usize = 30;

/// Label used for messages that never got a status
pub const NO_STATUS: &str = "No_Status";

/// Read share among outbound messages that reached `sent` or `read`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadFraction {
    pub read: usize,
    pub total: usize,
}

impl ReadFraction {
    pub fn not_read(&self) -> usize {
        self.total - self.read
    }

    /// `None` when there are no messages
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.read as f64 / self.total as f64)
    }
}

/// One equal-width histogram bucket, `[start, end)`; the last bucket is closed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Distribution of seconds between first `sent` and first `read`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub samples: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub bins: Vec<Bin>,
}

impl Histogram {
    /// Equal-width bins spanning the observed range. A single repeated value
    /// gets a one-unit range centered on it.
    pub fn build(values: &[f64], bins: usize) -> Self {
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() || bins == 0 {
            return Self::default();
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        let (low, high) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let width = (high - low) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in &values {
            let idx = (((v - low) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self {
            samples: values.len(),
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            bins: counts
                .into_iter()
                .enumerate()
                .map(|(i, count)| Bin {
                    start: low + width * i as f64,
                    end: low + width * (i + 1) as f64,
                    count,
                })
                .collect(),
        }
    }
}

/// Message count for one last-status value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusShare {
    pub status: String,
    pub messages: i64,
}

/// Everything the report stage computes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub as_of: NaiveDate,
    /// Distinct status recipients among messages in the user window
    pub total_users: i64,
    pub read_fraction: ReadFraction,
    pub time_to_read: Histogram,
    pub status_distribution: Vec<StatusShare>,
}

/// Start of `as_of - days` and start of the day after `as_of`
fn window(as_of: NaiveDate, days: i64) -> (String, String) {
    let fmt = "%Y-%m-%d %H:%M:%S";
    let start = (as_of - Duration::days(days)).and_time(chrono::NaiveTime::MIN);
    let end = (as_of + Duration::days(1)).and_time(chrono::NaiveTime::MIN);
    (start.format(fmt).to_string(), end.format(fmt).to_string())
}

/// Timestamp comparison bounds in the executor's placeholder syntax
fn window_bounds(dialect: Dialect) -> (String, String) {
    (
        dialect.placeholder(1, Some("timestamp")),
        dialect.placeholder(2, Some("timestamp")),
    )
}

pub async fn total_users(
    executor: &dyn Executor,
    tables: &TargetTables,
    as_of: NaiveDate,
) -> Result<i64> {
    let (from, to) = window_bounds(executor.dialect());
    let (start, end) = window(as_of, USER_WINDOW_DAYS);
    let statement = Statement::new(format!(
        "SELECT COUNT(DISTINCT s.number_id) AS total_users \
         FROM {} i LEFT JOIN {} s ON i.id = s.message_id \
         WHERE i.inserted_at >= {} AND i.inserted_at < {}",
        tables.messages_sql(),
        tables.statuses_sql(),
        from,
        to
    ))
    .bind(start)
    .bind(end);

    count(executor, &statement).await
}

/// Group `(message_id, status)` rows per message and count those read
pub fn read_fraction(rows: &Table) -> ReadFraction {
    let mut per_message: HashMap<String, bool> = HashMap::new();
    for row in 0..rows.len() {
        let status = rows.get(row, "status").and_then(Cell::to_text);
        let Some(status) = status.filter(|s| s == "sent" || s == "read") else {
            continue;
        };
        let Some(id) = rows.get(row, "message_id").and_then(Cell::to_text) else {
            continue;
        };
        let read = per_message.entry(id).or_default();
        *read |= status == "read";
    }

    ReadFraction {
        read: per_message.values().filter(|read| **read).count(),
        total: per_message.len(),
    }
}

/// Seconds from the first `sent` to the first `read` of each message that has both.
///
/// "First" means earliest `inserted_at`, not first in row order, so the result
/// does not depend on how the worksheet or the query happened to sort rows.
pub fn time_to_read(rows: &Table) -> Vec<f64> {
    let mut sent: BTreeMap<String, NaiveDateTime> = BTreeMap::new();
    let mut read: BTreeMap<String, NaiveDateTime> = BTreeMap::new();

    for row in 0..rows.len() {
        let (Some(id), Some(status), Some(at)) = (
            rows.get(row, "message_id").and_then(Cell::to_text),
            rows.get(row, "status").and_then(Cell::to_text),
            rows.get(row, "inserted_at").and_then(Cell::as_timestamp),
        ) else {
            continue;
        };
        let slot = match status.as_str() {
            "sent" => &mut sent,
            "read" => &mut read,
            _ => continue,
        };
        slot.entry(id)
            .and_modify(|first| *first = (*first).min(at))
            .or_insert(at);
    }

    sent.iter()
        .filter_map(|(id, sent_at)| {
            read.get(id)
                .map(|read_at| (*read_at - *sent_at).num_milliseconds() as f64 / 1000.0)
        })
        .collect()
}

pub async fn status_distribution(
    executor: &dyn Executor,
    tables: &TargetTables,
    as_of: NaiveDate,
) -> Result<Vec<StatusShare>> {
    let (from, to) = window_bounds(executor.dialect());
    let (start, end) = window(as_of, STATUS_WINDOW_DAYS);
    let statement = Statement::new(format!(
        "SELECT CASE WHEN i.last_status IS NULL THEN '{}' ELSE i.last_status END AS status, \
         COUNT(DISTINCT i.id) AS messages \
         FROM {} i \
         WHERE i.direction = 'outbound' AND i.inserted_at >= {} AND i.inserted_at < {} \
         GROUP BY 1 ORDER BY 1",
        NO_STATUS,
        tables.messages_sql(),
        from,
        to
    ))
    .bind(start)
    .bind(end);

    let table = executor.fetch(&statement).await?;
    Ok(shares(&table))
}

fn shares(table: &Table) -> Vec<StatusShare> {
    (0..table.len())
        .map(|row| StatusShare {
            status: table
                .get(row, "status")
                .and_then(Cell::to_text)
                .unwrap_or_else(|| NO_STATUS.to_string()),
            messages: table
                .get(row, "messages")
                .and_then(Cell::as_int)
                .unwrap_or(0),
        })
        .collect()
}

/// Compute every summary
pub async fn build(
    executor: &dyn Executor,
    tables: &TargetTables,
    as_of: NaiveDate,
) -> Result<ReportSummary> {
    let total_users = total_users(executor, tables, as_of)
        .await
        .context("Failed to count active users")?;

    let outbound = executor
        .fetch(&Statement::new(format!(
            "SELECT s.message_id, s.status FROM {} i LEFT JOIN {} s ON i.id = s.message_id \
             WHERE i.direction = 'outbound'",
            tables.messages_sql(),
            tables.statuses_sql()
        )))
        .await
        .context("Failed to fetch outbound statuses")?;

    let statuses = executor
        .fetch(&Statement::new(format!(
            "SELECT message_id, status, inserted_at FROM {} WHERE status IN ('sent', 'read')",
            tables.statuses_sql()
        )))
        .await
        .context("Failed to fetch sent/read statuses")?;

    let status_distribution = status_distribution(executor, tables, as_of)
        .await
        .context("Failed to compute status distribution")?;

    Ok(ReportSummary {
        as_of,
        total_users,
        read_fraction: read_fraction(&outbound),
        time_to_read: Histogram::build(&time_to_read(&statuses), HISTOGRAM_BINS),
        status_distribution,
    })
}

/// Lines printed under the report stage
pub fn describe(summary: &ReportSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Distinct users in the {} days to {}: {}",
        USER_WINDOW_DAYS, summary.as_of, summary.total_users
    )];

    let fraction = &summary.read_fraction;
    lines.push(match fraction.ratio() {
        Some(ratio) => format!(
            "Outbound messages read: {} of {} ({:.1}%)",
            fraction.read,
            fraction.total,
            ratio * 100.0
        ),
        None => "Outbound messages read: no sent or read messages".to_string(),
    });

    let hist = &summary.time_to_read;
    lines.push(match (hist.min, hist.mean, hist.max) {
        (Some(min), Some(mean), Some(max)) => format!(
            "Time to read: {} messages, min {:.0}s, mean {:.0}s, max {:.0}s",
            hist.samples, min, mean, max
        ),
        _ => "Time to read: no message was both sent and read".to_string(),
    });

    let total: i64 = summary.status_distribution.iter().map(|s| s.messages).sum();
    for share in &summary.status_distribution {
        let pct = if total > 0 {
            share.messages as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        lines.push(format!(
            "Last {} days, {}: {} ({:.1}%)",
            STATUS_WINDOW_DAYS, share.status, share.messages, pct
        ));
    }
    lines
}
