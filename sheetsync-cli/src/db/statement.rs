//! SQL text plus bound parameters

/// A statement ready to hand to an [`Executor`](super::Executor)
///
/// Every parameter is bound as nullable text. Typed targets get a cast in the
/// SQL text instead (see [`Dialect::placeholder`](super::Dialect::placeholder)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl Statement {
    /// Statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Add a bound parameter
    pub fn bind(mut self, value: impl Into<Option<String>>) -> Self {
        self.params.push(value.into());
        self
    }

    /// First keyword of the statement, upper-cased. Used in log lines.
    pub fn verb(&self) -> String {
        self.sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

/// Quote one identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name (`schema.table`)
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(|part| quote_ident(part.trim()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Split `schema.table` into its parts
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) => (Some(schema.trim()), table.trim()),
        None => (None, name.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("status"), "\"status\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_qualified() {
        assert_eq!(
            quote_qualified("whatsapp_data.msg_info"),
            "\"whatsapp_data\".\"msg_info\""
        );
        assert_eq!(quote_qualified("msg_info"), "\"msg_info\"");
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("a.b"), (Some("a"), "b"));
        assert_eq!(split_qualified("b"), (None, "b"));
    }

    #[test]
    fn test_builder_and_verb() {
        let stmt = Statement::new("  insert into t (a) values ($1)")
            .bind(Some("x".to_string()))
            .bind(None::<String>);
        assert_eq!(stmt.params, vec![Some("x".to_string()), None]);
        assert_eq!(stmt.verb(), "INSERT");
    }
}
