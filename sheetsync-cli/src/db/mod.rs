//! Relational store access
//!
//! An [`Executor`] runs statements and queries against one backend over a
//! connection pool. Failures are returned as [`ExecError`]; nothing is
//! swallowed at this layer.

mod dialect;
mod postgres;
mod sqlite;
mod statement;

pub use dialect::Dialect;
pub use postgres::PgExecutor;
pub use sqlite::SqliteExecutor;
pub use statement::{Statement, quote_ident, quote_qualified, split_qualified};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseProfile, DatabaseDriver};
use crate::table::Table;

/// Failures reported by an executor
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{verb} statement failed: {source}")]
    Statement {
        verb: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },

    #[error("column '{column}' has unsupported type {type_name}")]
    UnsupportedType { column: String, type_name: String },

    #[error("failed to describe table {table}: {source}")]
    Describe {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Column of an existing table as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// SQL type as the catalog spells it (e.g. `bigint`, `timestamp without time zone`)
    pub data_type: String,
    /// Underlying type name, used for user-defined and array types
    pub udt_name: String,
}

/// Runs SQL against a relational store
#[async_trait]
pub trait Executor: Send + Sync {
    /// SQL flavour of the backing store
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows; returns rows affected.
    /// Each call commits on its own.
    async fn execute(&self, statement: &Statement) -> Result<u64, ExecError>;

    /// Run a query and collect its result set
    async fn fetch(&self, statement: &Statement) -> Result<Table, ExecError>;

    /// Columns of `table` in ordinal order; empty if the table does not exist
    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, ExecError>;

    /// Release pooled connections
    async fn close(&self);
}

/// Open an executor for a configured database profile
pub async fn connect(profile: &DatabaseProfile) -> anyhow::Result<Box<dyn Executor>> {
    let executor: Box<dyn Executor> = match profile.driver {
        DatabaseDriver::Postgres => Box::new(PgExecutor::connect(profile).await?),
        DatabaseDriver::Sqlite => Box::new(SqliteExecutor::connect(profile).await?),
    };
    Ok(executor)
}
