//! In-memory executor double for unit tests

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::db::{ColumnInfo, Dialect, ExecError, Executor, Statement};
use crate::table::Table;

/// Records every statement and answers queries from canned tables
pub(crate) struct FakeExecutor {
    dialect: Dialect,
    executed: Mutex<Vec<Statement>>,
    fetched: Mutex<Vec<Statement>>,
    describe_calls: AtomicUsize,
    columns: Vec<ColumnInfo>,
    failing: HashSet<usize>,
    responses: Vec<(String, Table)>,
}

impl FakeExecutor {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            executed: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
            columns: Vec::new(),
            failing: HashSet::new(),
            responses: Vec::new(),
        }
    }

    /// Columns returned by `describe`
    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    /// Make the n-th `execute` call (0-based) fail
    pub fn fail_execute(mut self, call: usize) -> Self {
        self.failing.insert(call);
        self
    }

    /// Answer any query whose SQL contains `needle` with `table`
    pub fn respond(mut self, needle: &str, table: Table) -> Self {
        self.responses.push((needle.to_string(), table));
        self
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<Statement> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, ExecError> {
        let mut executed = self.executed.lock().unwrap();
        let call = executed.len();
        executed.push(statement.clone());
        if self.failing.contains(&call) {
            return Err(ExecError::Statement {
                verb: statement.verb(),
                source: sqlx::Error::Protocol("rejected by test".to_string()),
            });
        }
        Ok(statement.params.len() as u64)
    }

    async fn fetch(&self, statement: &Statement) -> Result<Table, ExecError> {
        self.fetched.lock().unwrap().push(statement.clone());
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| statement.sql.contains(needle.as_str()))
            .map(|(_, table)| table.clone())
            .unwrap_or_default())
    }

    async fn describe(&self, _table: &str) -> Result<Vec<ColumnInfo>, ExecError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.columns.clone())
    }

    async fn close(&self) {}
}
