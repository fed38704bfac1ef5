//! Batch sizing and insert statement construction

use crate::db::{Dialect, Statement, quote_ident, quote_qualified};
use crate::table::Cell;

/// Rows per statement after honoring the dialect's bind-parameter limit
pub fn effective_chunk_size(requested: usize, columns: usize, dialect: Dialect) -> usize {
    let per_statement = dialect.max_bind_params() / columns.max(1);
    requested.min(per_statement).max(1)
}

/// Builds multi-row `INSERT` statements for one target table
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    dialect: Dialect,
    head: String,
    casts: Vec<Option<String>>,
}

impl InsertBuilder {
    /// `casts` is aligned with `columns`; `None` binds the text as is
    pub fn new(
        dialect: Dialect,
        table: &str,
        columns: &[String],
        casts: Vec<Option<String>>,
    ) -> Self {
        debug_assert_eq!(columns.len(), casts.len());
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            dialect,
            head: format!(
                "INSERT INTO {} ({}) VALUES ",
                quote_qualified(table),
                column_list
            ),
            casts,
        }
    }

    /// Builder that never casts
    pub fn uncast(dialect: Dialect, table: &str, columns: &[String]) -> Self {
        Self::new(dialect, table, columns, vec![None; columns.len()])
    }

    /// One statement covering every row of `rows`, one parameter per cell
    pub fn build(&self, rows: &[Vec<Cell>]) -> Statement {
        let width = self.casts.len();
        let mut sql = String::with_capacity(self.head.len() + rows.len() * width * 8);
        sql.push_str(&self.head);

        let mut params = Vec::with_capacity(rows.len() * width);
        for (row_idx, row) in rows.iter().enumerate() {
            if row_idx > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (col_idx, cell) in row.iter().enumerate() {
                if col_idx > 0 {
                    sql.push_str(", ");
                }
                params.push(cell.to_text());
                let cast = self.casts.get(col_idx).and_then(|c| c.as_deref());
                sql.push_str(&self.dialect.placeholder(params.len(), cast));
            }
            sql.push(')');
        }

        Statement { sql, params }
    }
}
