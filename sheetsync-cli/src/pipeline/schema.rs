//! Target tables and their DDL

use crate::db::{Dialect, Statement, quote_ident, quote_qualified};

const MSG_INFO_DDL: &str = include_str!("../../sql/create_msg_info.sql");
const MSG_STATUS_DDL: &str = include_str!("../../sql/create_msg_status.sql");

pub const MSG_INFO: &str = "msg_info";
pub const MSG_STATUS: &str = "msg_status";

/// Names of the two message tables inside one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTables {
    schema: String,
}

impl TargetTables {
    /// An empty schema leaves table names unqualified
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into().trim().to_string(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn qualify(&self, table: &str) -> String {
        if self.schema.is_empty() {
            table.to_string()
        } else {
            format!("{}.{}", self.schema, table)
        }
    }

    /// `schema.msg_info`, unquoted
    pub fn messages(&self) -> String {
        self.qualify(MSG_INFO)
    }

    /// `schema.msg_status`, unquoted
    pub fn statuses(&self) -> String {
        self.qualify(MSG_STATUS)
    }

    /// Quoted message table for use in SQL text
    pub fn messages_sql(&self) -> String {
        quote_qualified(&self.messages())
    }

    /// Quoted status table for use in SQL text
    pub fn statuses_sql(&self) -> String {
        quote_qualified(&self.statuses())
    }

    /// Statements that create both tables if they are missing
    pub fn create_statements(&self, dialect: Dialect) -> Vec<Statement> {
        let mut statements = Vec::new();
        if dialect == Dialect::Postgres && !self.schema.is_empty() {
            statements.push(Statement::new(format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_ident(&self.schema)
            )));
        }
        statements.push(Statement::new(
            MSG_INFO_DDL.trim().replace("{table}", &self.messages_sql()),
        ));
        statements.push(Statement::new(
            MSG_STATUS_DDL.trim().replace("{table}", &self.statuses_sql()),
        ));
        statements
    }
}
