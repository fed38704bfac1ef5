//! Backend-specific SQL details

use serde::{Deserialize, Serialize};

use super::statement::{quote_ident, quote_qualified};

/// SQL flavour spoken by an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Most bind parameters a single statement may carry
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Postgres => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    /// Whether text parameters need an explicit cast to reach typed columns
    pub fn casts_parameters(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Placeholder for the 1-based parameter `index`, optionally cast to `sql_type`
    pub fn placeholder(&self, index: usize, sql_type: Option<&str>) -> String {
        match (self, sql_type) {
            (Dialect::Postgres, Some(ty)) => format!("CAST(${} AS {})", index, ty),
            (Dialect::Postgres, None) => format!("${}", index),
            (Dialect::Sqlite, _) => format!("?{}", index),
        }
    }

    /// Statement that removes every row from `table`
    pub fn clear_table(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("TRUNCATE TABLE {}", quote_qualified(table)),
            Dialect::Sqlite => format!("DELETE FROM {}", quote_qualified(table)),
        }
    }

    /// Render a type name reported by `describe` so it can follow `AS` in a cast
    pub fn cast_type(&self, data_type: &str, udt_name: &str) -> Option<String> {
        if !self.casts_parameters() {
            return None;
        }
        match data_type {
            "USER-DEFINED" | "ARRAY" => Some(quote_ident(udt_name)),
            "" => None,
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3, None), "$3");
        assert_eq!(
            Dialect::Postgres.placeholder(1, Some("bigint")),
            "CAST($1 AS bigint)"
        );
        assert_eq!(Dialect::Sqlite.placeholder(2, Some("bigint")), "?2");
    }

    #[test]
    fn test_clear_table() {
        assert_eq!(
            Dialect::Postgres.clear_table("s.t"),
            "TRUNCATE TABLE \"s\".\"t\""
        );
        assert_eq!(Dialect::Sqlite.clear_table("t"), "DELETE FROM \"t\"");
    }

    #[test]
    fn test_cast_type() {
        assert_eq!(
            Dialect::Postgres.cast_type("timestamp without time zone", "timestamp"),
            Some("timestamp without time zone".to_string())
        );
        assert_eq!(
            Dialect::Postgres.cast_type("USER-DEFINED", "mood"),
            Some("\"mood\"".to_string())
        );
        assert_eq!(Dialect::Sqlite.cast_type("INTEGER", "INTEGER"), None);
    }
}
