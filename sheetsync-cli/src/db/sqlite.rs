//! SQLite executor, used for local runs and tests

use std::str::FromStr;

use async_trait::async_trait;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Statement as _;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{ColumnInfo, Dialect, ExecError, Executor, Statement, quote_ident, split_qualified};
use crate::config::DatabaseProfile;
use crate::table::{Cell, Table};

/// Executor backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Connect using a configured profile (`path` is a file or `:memory:`)
    pub async fn connect(profile: &DatabaseProfile) -> Result<Self, ExecError> {
        let path = profile.path.as_deref().unwrap_or(":memory:");
        if is_memory(path) {
            return Self::in_memory().await;
        }

        let target = format!("sqlite:{}", path);
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(profile.max_connections)
            .acquire_timeout(profile.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|source| ExecError::Connect { target, source })?;

        Ok(Self { pool })
    }

    /// Private in-memory database. One connection that never expires, so the
    /// data lives as long as the executor.
    pub async fn in_memory() -> Result<Self, ExecError> {
        let connect_err = |source| ExecError::Connect {
            target: "sqlite::memory:".to_string(),
            source,
        };
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(connect_err)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(connect_err)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn is_memory(path: &str) -> bool {
    let trimmed = path.trim();
    trimmed.eq_ignore_ascii_case(":memory:") || trimmed.eq_ignore_ascii_case("memory")
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, ExecError> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_deref());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|source| ExecError::Statement {
                verb: statement.verb(),
                source,
            })?;

        debug!(
            "{} affected {} rows",
            statement.verb(),
            result.rows_affected()
        );
        Ok(result.rows_affected())
    }

    async fn fetch(&self, statement: &Statement) -> Result<Table, ExecError> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_deref());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ExecError::Query { source })?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => {
                let prepared = sqlx::Executor::prepare(&self.pool, statement.sql.as_str())
                    .await
                    .map_err(|source| ExecError::Query { source })?;
                prepared
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        let mut cells = Vec::with_capacity(rows.len());
        for row in &rows {
            cells.push(decode_row(row)?);
        }

        Ok(Table::from_parts_unchecked(columns, cells))
    }

    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, ExecError> {
        let (schema, name) = split_qualified(table);
        let sql = match schema {
            Some(schema) => format!(
                "PRAGMA {}.table_info({})",
                quote_ident(schema),
                quote_ident(name)
            ),
            None => format!("PRAGMA table_info({})", quote_ident(name)),
        };

        let describe_err = |source| ExecError::Describe {
            table: table.to_string(),
            source,
        };
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(describe_err)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.try_get("type").map_err(describe_err)?;
            columns.push(ColumnInfo {
                name: row.try_get("name").map_err(describe_err)?,
                udt_name: data_type.clone(),
                data_type,
            });
        }

        Ok(columns)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode one result row by each value's storage class
fn decode_row(row: &SqliteRow) -> Result<Vec<Cell>, ExecError> {
    let query_err = |source| ExecError::Query { source };
    let mut cells = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx).map_err(query_err)?;
        if raw.is_null() {
            cells.push(Cell::Null);
            continue;
        }

        // SQLite is dynamically typed; go by what is stored, not what was declared
        let storage = raw.type_info().name().to_string();
        let cell = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => Cell::Int(row.try_get_unchecked(idx).map_err(query_err)?),
            "REAL" | "NUMERIC" => Cell::Float(row.try_get_unchecked(idx).map_err(query_err)?),
            "TEXT" | "DATE" | "TIME" | "DATETIME" => {
                Cell::Text(row.try_get_unchecked(idx).map_err(query_err)?)
            }
            _ => {
                return Err(ExecError::UnsupportedType {
                    column: column.name().to_string(),
                    type_name: storage,
                });
            }
        };
        cells.push(cell);
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_fetch_roundtrip() {
        let exec = SqliteExecutor::in_memory().await.unwrap();
        exec.execute(&Statement::new("CREATE TABLE t (id INTEGER, note TEXT, score REAL)"))
            .await
            .unwrap();

        let inserted = exec
            .execute(
                &Statement::new("INSERT INTO t (id, note, score) VALUES (?1, ?2, ?3)")
                    .bind("1".to_string())
                    .bind(None::<String>)
                    .bind("2.5".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let table = exec
            .fetch(&Statement::new("SELECT id, note, score FROM t"))
            .await
            .unwrap();
        assert_eq!(table.columns(), ["id", "note", "score"]);
        // Column affinity turns bound text into numbers
        assert_eq!(
            table.rows(),
            [vec![Cell::Int(1), Cell::Null, Cell::Float(2.5)]]
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_keeps_header() {
        let exec = SqliteExecutor::in_memory().await.unwrap();
        exec.execute(&Statement::new("CREATE TABLE t (id INTEGER, status TEXT)"))
            .await
            .unwrap();

        let table = exec
            .fetch(&Statement::new("SELECT id, status FROM t"))
            .await
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), ["id", "status"]);
    }

    #[tokio::test]
    async fn test_failures_propagate() {
        let exec = SqliteExecutor::in_memory().await.unwrap();
        let err = exec
            .execute(&Statement::new("INSERT INTO missing (a) VALUES (1)"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Statement { ref verb, .. } if verb == "INSERT"));

        let err = exec
            .fetch(&Statement::new("SELECT * FROM missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Query { .. }));
    }

    #[tokio::test]
    async fn test_describe() {
        let exec = SqliteExecutor::in_memory().await.unwrap();
        exec.execute(&Statement::new(
            "CREATE TABLE msg (id BIGINT, status VARCHAR(20))",
        ))
        .await
        .unwrap();

        let columns = exec.describe("msg").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "status"]);
        assert_eq!(columns[0].data_type, "BIGINT");

        assert!(exec.describe("nope").await.unwrap().is_empty());
    }
}
