pub mod config;
pub mod per_thread;
pub mod recording;
pub mod sqlite;
pub mod transaction;

use crate::core::{Result, Value, escape};
use crate::result::Cursor;
use config::DatabaseConfig;
use per_thread::PerThreadExecutor;
use sqlite::SqliteExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use transaction::Transaction;

/// Boundary to the underlying SQL driver.
///
/// Runs parameterized statements and reports rows, column names and the
/// last inserted row id. Implementations own the connection and the
/// driver's commit semantics.
pub trait Executor: Send + Sync {
    /// Run one statement with bound parameters
    fn execute(&self, sql: &str, values: &[Value]) -> Result<Cursor>;

    /// Run a multi-statement script without parameters
    fn execute_script(&self, sql: &str) -> Result<Cursor>;

    /// Parameter placeholder token understood by the driver
    fn placeholder(&self) -> &'static str {
        "?"
    }

    fn begin(&self) -> Result<()>;

    /// Commit pending work; a no-op when nothing is pending
    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Connection a transaction begun now must stay on.
    ///
    /// Backends that hand each caller a different connection return the
    /// caller's; `None` means every call already reaches the same one.
    fn pin(&self) -> Result<Option<Arc<dyn Executor>>> {
        Ok(None)
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        (**self).execute(sql, values)
    }

    fn execute_script(&self, sql: &str) -> Result<Cursor> {
        (**self).execute_script(sql)
    }

    fn placeholder(&self) -> &'static str {
        (**self).placeholder()
    }

    fn begin(&self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }

    fn pin(&self) -> Result<Option<Arc<dyn Executor>>> {
        (**self).pin()
    }
}

/// Anything statements can be issued through: the database itself, or an
/// open transaction on it.
pub trait Session {
    fn database(&self) -> &Database;

    fn raw_sql(&self, sql: &str, values: &[Value]) -> Result<Cursor>;
}

struct DatabaseInner {
    executor: Box<dyn Executor>,
    config: DatabaseConfig,
    in_transaction: AtomicBool,
}

/// Shared database handle
///
/// Cheap to clone; all clones share one executor and one transaction flag.
///
/// # Examples
///
/// ```
/// # use autumn::{Database, Value};
/// # fn main() -> autumn::Result<()> {
/// let db = Database::open_in_memory()?;
/// db.raw_sql_script("CREATE TABLE kv (k TEXT, v INTEGER)")?;
/// db.raw_sql("INSERT INTO kv (k, v) VALUES (?, ?)", &["a".into(), 1.into()])?;
///
/// let rows = db.sql("SELECT * FROM kv", &[])?;
/// assert_eq!(rows[0]["v"], Value::Integer(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Wrap a custom executor
    pub fn new(executor: impl Executor + 'static, config: DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                executor: Box::new(executor),
                config,
                in_transaction: AtomicBool::new(false),
            }),
        }
    }

    /// Open the SQLite backend described by `config`
    pub fn connect(config: DatabaseConfig) -> Result<Self> {
        config
            .validate()
            .map_err(crate::core::OrmError::Configuration)?;

        if config.per_thread {
            let factory_config = config.clone();
            let executor =
                PerThreadExecutor::new(move || SqliteExecutor::from_config(&factory_config))?;
            return Ok(Self::new(executor, config));
        }

        let executor = SqliteExecutor::from_config(&config)?;
        Ok(Self::new(executor, config))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::connect(DatabaseConfig::in_memory())
    }

    pub fn open(path: &str) -> Result<Self> {
        Self::connect(DatabaseConfig::file(path))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    pub fn is_debug(&self) -> bool {
        self.inner.config.debug
    }

    pub fn placeholder(&self) -> &'static str {
        self.inner.executor.placeholder()
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction.load(Ordering::SeqCst)
    }

    /// Execute a statement with bound values, committing unless a
    /// transaction is open
    pub fn raw_sql(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        self.raw_sql_on(self.executor(), sql, values)
    }

    /// Execute a multi-statement script
    pub fn raw_sql_script(&self, sql: &str) -> Result<Cursor> {
        self.raw_sql_script_on(self.executor(), sql)
    }

    pub(crate) fn raw_sql_on(
        &self,
        executor: &dyn Executor,
        sql: &str,
        values: &[Value],
    ) -> Result<Cursor> {
        tracing::debug!(sql, params = values.len(), "raw_sql");

        let outcome = executor.execute(sql, values).and_then(|cursor| {
            self.commit_if_autocommit(executor)?;
            Ok(cursor)
        });

        if let Err(err) = &outcome {
            if self.is_debug() {
                tracing::error!(error = %err, sql, values = ?values, "raw_sql failed");
            }
        }
        outcome
    }

    pub(crate) fn raw_sql_script_on(&self, executor: &dyn Executor, sql: &str) -> Result<Cursor> {
        tracing::debug!(sql, "raw_sql_script");

        let outcome = executor.execute_script(sql).and_then(|cursor| {
            self.commit_if_autocommit(executor)?;
            Ok(cursor)
        });

        if let Err(err) = &outcome {
            if self.is_debug() {
                tracing::error!(error = %err, sql, "raw_sql_script failed");
            }
        }
        outcome
    }

    /// Execute a statement and return rows keyed by column name
    pub fn sql(&self, sql: &str, values: &[Value]) -> Result<Vec<HashMap<String, Value>>> {
        Ok(self.raw_sql(sql, values)?.into_maps())
    }

    /// Start an explicit transaction; auto-commit is suspended until the
    /// returned handle is committed, rolled back or dropped
    pub fn begin(&self) -> Result<Transaction> {
        Transaction::begin(self)
    }

    /// Whether `table` can be selected from
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let probe = format!("SELECT * FROM {} LIMIT 1", escape(table));
        match self.inner.executor.execute(&probe, &[]) {
            Ok(_) => Ok(true),
            Err(crate::core::OrmError::Driver(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Run a creation script inside its own transaction
    pub fn create_table(&self, script: &str) -> Result<()> {
        let tx = self.begin()?;
        tx.raw_sql_script(script)?;
        tx.commit()
    }

    /// Run `script` only when `table` does not exist yet; returns whether it ran
    pub fn create_table_if_needed(&self, table: &str, script: &str) -> Result<bool> {
        if self.table_exists(table)? {
            return Ok(false);
        }
        self.create_table(script)?;
        Ok(true)
    }

    pub(crate) fn executor(&self) -> &dyn Executor {
        self.inner.executor.as_ref()
    }

    pub(crate) fn transaction_flag(&self) -> &AtomicBool {
        &self.inner.in_transaction
    }

    fn commit_if_autocommit(&self, executor: &dyn Executor) -> Result<()> {
        if self.in_transaction() {
            return Ok(());
        }
        executor.commit()
    }
}

impl Session for Database {
    fn database(&self) -> &Database {
        self
    }

    fn raw_sql(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        Database::raw_sql(self, sql, values)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.inner.config)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
