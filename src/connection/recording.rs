use super::Executor;
use crate::core::{Result, Value};
use crate::result::Cursor;
use std::sync::{Arc, Mutex};

/// One statement as it reached the driver
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Wraps an executor and keeps every statement sent through it.
///
/// Scripts are recorded with no values. Statements are recorded before they
/// run, so failed statements appear too. A connection pinned by a
/// transaction writes to the same log.
pub struct RecordingExecutor<E> {
    inner: E,
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl<E: Executor> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Recorded SQL text only
    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn last(&self) -> Option<Statement> {
        self.statements.lock().ok().and_then(|s| s.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.clear();
        }
    }

    fn record(&self, sql: &str, values: &[Value]) -> Result<()> {
        self.statements.lock()?.push(Statement {
            sql: sql.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }
}

impl<E: Executor> Executor for RecordingExecutor<E> {
    fn execute(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        self.record(sql, values)?;
        self.inner.execute(sql, values)
    }

    fn execute_script(&self, sql: &str) -> Result<Cursor> {
        self.record(sql, &[])?;
        self.inner.execute_script(sql)
    }

    fn placeholder(&self) -> &'static str {
        self.inner.placeholder()
    }

    fn begin(&self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()
    }

    fn pin(&self) -> Result<Option<Arc<dyn Executor>>> {
        let pinned = self.inner.pin()?.map(|conn| {
            Arc::new(RecordingExecutor {
                inner: conn,
                statements: Arc::clone(&self.statements),
            }) as Arc<dyn Executor>
        });
        Ok(pinned)
    }
}
