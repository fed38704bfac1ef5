//! PostgreSQL executor over a sqlx pool

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Statement as _;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{ColumnInfo, Dialect, ExecError, Executor, Statement, split_qualified};
use crate::config::DatabaseProfile;
use crate::table::{Cell, Table};

/// Executor backed by a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect using a configured profile and verify the connection
    pub async fn connect(profile: &DatabaseProfile) -> Result<Self, ExecError> {
        let mut options = PgConnectOptions::new()
            .host(profile.hostname())
            .port(profile.port);
        if let Some(database) = &profile.database {
            options = options.database(database);
        }
        if let Some(username) = &profile.username {
            options = options.username(username);
        }
        if let Some(password) = profile.resolve_password() {
            options = options.password(&password);
        }

        let target = profile.display_target();
        let pool = PgPoolOptions::new()
            .max_connections(profile.max_connections)
            .acquire_timeout(profile.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|source| ExecError::Connect {
                target: target.clone(),
                source,
            })?;

        // Test the connection
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|source| ExecError::Connect { target, source })?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Executor for PgExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
                // No rows to read the header from; ask the server instead
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

        let rows = sqlx::query(
            r#"
            SELECT column_name::text AS column_name,
                   data_type::text AS data_type,
                   udt_name::text AS udt_name
            FROM information_schema.columns
            WHERE table_schema = COALESCE($1, current_schema())
              AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| ExecError::Describe {
            table: table.to_string(),
            source,
        })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let describe_err = |source| ExecError::Describe {
                table: table.to_string(),
                source,
            };
            columns.push(ColumnInfo {
                name: row.try_get("column_name").map_err(describe_err)?,
                data_type: row.try_get("data_type").map_err(describe_err)?,
                udt_name: row.try_get("udt_name").map_err(describe_err)?,
            });
        }

        Ok(columns)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode one result row by the declared column types
fn decode_row(row: &PgRow) -> Result<Vec<Cell>, ExecError> {
    let query_err = |source| ExecError::Query { source };
    let mut cells = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx).map_err(query_err)?;
        if raw.is_null() {
            cells.push(Cell::Null);
            continue;
        }

        let type_name = column.type_info().name().to_string();
        let cell = match type_name.as_str() {
            "BOOL" => Cell::Bool(row.try_get(idx).map_err(query_err)?),
            "INT2" => Cell::Int(row.try_get::<i16, _>(idx).map_err(query_err)? as i64),
            "INT4" => Cell::Int(row.try_get::<i32, _>(idx).map_err(query_err)? as i64),
            "INT8" => Cell::Int(row.try_get(idx).map_err(query_err)?),
            "FLOAT4" => Cell::Float(row.try_get::<f32, _>(idx).map_err(query_err)? as f64),
            "FLOAT8" => Cell::Float(row.try_get(idx).map_err(query_err)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
                Cell::Text(row.try_get(idx).map_err(query_err)?)
            }
            "UUID" => Cell::Text(
                row.try_get::<uuid::Uuid, _>(idx)
                    .map_err(query_err)?
                    .to_string(),
            ),
            "TIMESTAMP" => Cell::Timestamp(row.try_get::<NaiveDateTime, _>(idx).map_err(query_err)?),
            "TIMESTAMPTZ" => Cell::Timestamp(
                row.try_get::<DateTime<Utc>, _>(idx)
                    .map_err(query_err)?
                    .naive_utc(),
            ),
            "DATE" => Cell::Date(row.try_get::<NaiveDate, _>(idx).map_err(query_err)?),
            "NUMERIC" => numeric_cell(row.try_get::<Decimal, _>(idx).map_err(query_err)?),
            "TIME" => Cell::Text(time_text(row.try_get::<NaiveTime, _>(idx).map_err(query_err)?)),
            "INTERVAL" => Cell::Text(interval_text(
                &row.try_get::<PgInterval, _>(idx).map_err(query_err)?,
            )),
            "BYTEA" => Cell::Text(bytea_text(
                &row.try_get::<Vec<u8>, _>(idx).map_err(query_err)?,
            )),
            "JSON" | "JSONB" => Cell::Text(
                row.try_get::<serde_json::Value, _>(idx)
                    .map_err(query_err)?
                    .to_string(),
            ),
            _ => {
                return Err(ExecError::UnsupportedType {
                    column: column.name().to_string(),
                    type_name,
                });
            }
        };
        cells.push(cell);
    }

    Ok(cells)
}

/// Whole numbers that fit stay integers (`SUM` over integer columns);
/// anything with a fractional scale becomes a float.
fn numeric_cell(value: Decimal) -> Cell {
    if value.scale() == 0 {
        if let Some(int) = value.to_i64() {
            return Cell::Int(int);
        }
    }
    match value.to_f64() {
        Some(float) => Cell::Float(float),
        None => Cell::Text(value.to_string()),
    }
}

fn time_text(time: NaiveTime) -> String {
    time.format("%H:%M:%S%.f").to_string()
}

/// Interval in the server's default output style, e.g. `1 year 2 mons 3 days 04:05:06`
fn interval_text(interval: &PgInterval) -> String {
    let units = [
        (i64::from(interval.months / 12), "year"),
        (i64::from(interval.months % 12), "mon"),
        (i64::from(interval.days), "day"),
    ];
    let mut parts: Vec<String> = units
        .iter()
        .filter(|(n, _)| *n != 0)
        .map(|(n, unit)| {
            let plural = if n.abs() == 1 { "" } else { "s" };
            format!("{} {}{}", n, unit, plural)
        })
        .collect();

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = total % 1_000_000;
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Hex form, as `psql` prints it
fn bytea_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_numeric_integers_stay_integers() {
        assert_eq!(numeric_cell(Decimal::new(6, 0)), Cell::Int(6));
        assert_eq!(numeric_cell(Decimal::new(-42, 0)), Cell::Int(-42));
    }

    #[test]
    fn test_numeric_fractions_become_floats() {
        assert_eq!(numeric_cell(Decimal::new(25, 1)), Cell::Float(2.5));
        // AVG keeps a wide scale even for whole results
        assert_eq!(
            numeric_cell(Decimal::from_str("2.0000000000000000").unwrap()),
            Cell::Float(2.0)
        );
    }

    #[test]
    fn test_numeric_beyond_i64_is_float() {
        let big = Decimal::from_str("12345678901234567890").unwrap();
        assert!(matches!(numeric_cell(big), Cell::Float(f) if f > 1.2e19));
    }

    #[test]
    fn test_time_text() {
        let time = NaiveTime::from_hms_opt(10, 2, 0).unwrap();
        assert_eq!(time_text(time), "10:02:00");
        let time = NaiveTime::from_hms_milli_opt(10, 2, 0, 250).unwrap();
        assert_eq!(time_text(time), "10:02:00.250");
    }

    #[test]
    fn test_interval_text() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(interval_text(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(interval_text(&interval(0, 0, 120_000_000)), "00:02:00");
        assert_eq!(
            interval_text(&interval(14, 3, 3_723_500_000)),
            "1 year 2 mons 3 days 01:02:03.5"
        );
        assert_eq!(interval_text(&interval(0, 1, -90_000_000)), "1 day -00:01:30");
        assert_eq!(interval_text(&interval(1, 2, 0)), "1 mon 2 days");
    }

    #[test]
    fn test_bytea_text() {
        assert_eq!(bytea_text(&[0xde, 0xad, 0x01]), "\\xdead01");
        assert_eq!(bytea_text(&[]), "\\x");
    }
}
