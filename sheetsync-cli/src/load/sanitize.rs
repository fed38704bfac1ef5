//! Column-name and cell normalization applied before loading

use crate::table::{Cell, Table};

/// Text values the spreadsheet side uses to mean "no value"
pub const DEFAULT_MISSING_MARKERS: &[&str] = &["", "nan", "None", "NaT", "<NA>"];

/// Normalizes a table so its column names match the target naming convention
/// and every present value is text.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    separator: char,
    quote_replacement: Option<char>,
    missing_markers: Vec<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            separator: '_',
            quote_replacement: Some('"'),
            missing_markers: DEFAULT_MISSING_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Character that replaces each space in column names
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Character that replaces `'` in values; `None` keeps quotes as they are
    pub fn quote_replacement(mut self, replacement: Option<char>) -> Self {
        self.quote_replacement = replacement;
        self
    }

    /// Text values that are treated as missing
    pub fn missing_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Normalize one column name: every space becomes the separator, then
    /// lower-case. Runs are not collapsed and edges are not trimmed, so
    /// `"Message  Id"` maps to `message__id`.
    pub fn column_name(&self, raw: &str) -> String {
        raw.replace(' ', &self.separator.to_string()).to_lowercase()
    }

    /// Normalize one cell. Nulls stay null; everything else becomes text.
    pub fn cell(&self, cell: &Cell) -> Cell {
        let Some(text) = cell.to_text() else {
            return Cell::Null;
        };
        if self.missing_markers.iter().any(|m| *m == text) {
            return Cell::Null;
        }
        match self.quote_replacement {
            Some(replacement) => Cell::Text(text.replace('\'', &replacement.to_string())),
            None => Cell::Text(text),
        }
    }

    /// Produce a sanitized copy of `table`
    pub fn sanitize(&self, table: &Table) -> Table {
        let columns = table
            .columns()
            .iter()
            .map(|c| self.column_name(c))
            .collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| row.iter().map(|c| self.cell(c)).collect())
            .collect();
        Table::from_parts_unchecked(columns, rows)
    }
}
