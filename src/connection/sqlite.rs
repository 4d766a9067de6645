use super::Executor;
use super::config::DatabaseConfig;
use crate::core::{OrmError, Result, Value};
use crate::result::Cursor;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// SQLite backend over a single mutex-guarded connection.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let executor = if config.is_memory() {
            Self::open_in_memory()?
        } else {
            Self::open(&config.path)?
        };

        if let Some(timeout) = config.busy_timeout_ms {
            executor
                .conn
                .lock()?
                .busy_timeout(Duration::from_millis(timeout))?;
        }

        Ok(executor)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl Executor for SqliteExecutor {
    fn execute(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        // Statements without a result set report affected rows and the insert id
        if columns.is_empty() {
            let affected = stmt.execute(params_from_iter(values.iter()))?;
            return Ok(Cursor::new(columns, Vec::new())
                .with_rows_affected(affected)
                .with_last_insert_id(Some(conn.last_insert_rowid())));
        }

        let width = columns.len();
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for i in 0..width {
                record.push(from_value_ref(row.get_ref(i)?));
            }
            out.push(record);
        }

        Ok(Cursor::new(columns, out))
    }

    fn execute_script(&self, sql: &str) -> Result<Cursor> {
        self.conn.lock()?.execute_batch(sql)?;
        Ok(Cursor::empty())
    }

    fn begin(&self) -> Result<()> {
        let conn = self.conn.lock()?;
        if !conn.is_autocommit() {
            return Err(OrmError::Execution("Transaction already active".into()));
        }
        conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let conn = self.conn.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let conn = self.conn.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}
