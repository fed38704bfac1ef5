//! Transformation counts and data-quality checks over the loaded tables

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;

use super::schema::TargetTables;
use crate::db::{Executor, Statement};

/// Row counts of the joined message/status view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformSummary {
    /// Rows of messages left-joined with their statuses
    pub joined_rows: i64,
    /// Joined rows beyond the first per (message id, content)
    pub duplicate_rows: i64,
}

/// Outcome of one validation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub description: &'static str,
    /// Rows that violate the check
    pub offending: i64,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.offending == 0
    }
}

/// Run a query whose first cell is a count
pub(crate) async fn count(executor: &dyn Executor, statement: &Statement) -> Result<i64> {
    debug!("Counting: {}", statement.sql);
    let table = executor.fetch(statement).await?;
    let value = table
        .rows()
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_int());
    Ok(value.unwrap_or(0))
}

pub async fn transform(executor: &dyn Executor, tables: &TargetTables) -> Result<TransformSummary> {
    let joined = format!(
        "SELECT i.id AS message_id, i.content, s.id AS status_id, \
         ROW_NUMBER() OVER (PARTITION BY i.id, i.content ORDER BY s.id) AS row_num \
         FROM {} i LEFT JOIN {} s ON i.id = s.message_id",
        tables.messages_sql(),
        tables.statuses_sql()
    );

    let joined_rows = count(
        executor,
        &Statement::new(format!("SELECT COUNT(*) AS total_rows FROM ({}) joined", joined)),
    )
    .await
    .context("Failed to count joined rows")?;

    let duplicate_rows = count(
        executor,
        &Statement::new(format!(
            "WITH joined AS ({}) SELECT COUNT(*) AS duplicate_rows FROM joined WHERE row_num > 1",
            joined
        )),
    )
    .await
    .context("Failed to count duplicate rows")?;

    Ok(TransformSummary {
        joined_rows,
        duplicate_rows,
    })
}

struct Check {
    name: &'static str,
    description: &'static str,
    sql: String,
}

fn checks(tables: &TargetTables) -> Vec<Check> {
    let info = tables.messages_sql();
    let status = tables.statuses_sql();
    vec![
        Check {
            name: "orphan_statuses",
            description: "statuses whose message does not exist",
            sql: format!(
                "SELECT COUNT(*) FROM {status} s LEFT JOIN {info} i ON s.message_id = i.id \
                 WHERE i.id IS NULL"
            ),
        },
        Check {
            name: "messages_without_status",
            description: "messages with no status record",
            sql: format!(
                "SELECT COUNT(*) FROM {info} i LEFT JOIN {status} s ON i.id = s.message_id \
                 WHERE s.message_id IS NULL"
            ),
        },
        Check {
            name: "read_before_delivered",
            description: "read recorded before delivered for the same message",
            sql: format!(
                "SELECT COUNT(*) FROM {status} s1 JOIN {status} s2 ON s1.message_id = s2.message_id \
                 WHERE s1.status = 'read' AND s2.status = 'delivered' \
                 AND s1.inserted_at < s2.inserted_at"
            ),
        },
        Check {
            name: "inserted_after_updated",
            description: "messages inserted after their last update",
            sql: format!("SELECT COUNT(*) FROM {info} WHERE inserted_at > updated_at"),
        },
    ]
}

/// Run every check. Violations are reported, not treated as errors.
pub async fn validate(executor: &dyn Executor, tables: &TargetTables) -> Result<Vec<CheckResult>> {
    let mut results = Vec::new();
    for check in checks(tables) {
        let offending = count(executor, &Statement::new(check.sql))
            .await
            .with_context(|| format!("Check '{}' failed to run", check.name))?;
        if offending > 0 {
            warn!("{}: {} {}", check.name, offending, check.description);
        }
        results.push(CheckResult {
            name: check.name,
            description: check.description,
            offending,
        });
    }
    Ok(results)
}
