use super::{Database, Executor, Session};
use crate::core::{OrmError, Result, Value};
use crate::result::Cursor;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Explicit transaction on a `Database`
///
/// Finished exactly once: `commit` and `rollback` consume the handle, and a
/// handle dropped while still active rolls back.
///
/// The handle stays on the connection it was begun on, so it may be
/// finished from another thread even with per-thread connections.
///
/// # Examples
///
/// ```
/// # use autumn::Database;
/// # fn main() -> autumn::Result<()> {
/// let db = Database::open_in_memory()?;
/// db.raw_sql_script("CREATE TABLE t (id INTEGER)")?;
///
/// let tx = db.begin()?;
/// tx.raw_sql("INSERT INTO t (id) VALUES (?)", &[1.into()])?;
/// tx.raw_sql("INSERT INTO t (id) VALUES (?)", &[2.into()])?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction {
    db: Database,
    pinned: Option<Arc<dyn Executor>>,
    state: TransactionState,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("db", &self.db)
            .field("pinned", &self.pinned.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl Transaction {
    pub(crate) fn begin(db: &Database) -> Result<Self> {
        let flag = db.transaction_flag();
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OrmError::Execution("Transaction already active".into()));
        }

        let pinned = db.executor().pin().and_then(|pinned| {
            match &pinned {
                Some(conn) => conn.begin()?,
                None => db.executor().begin()?,
            }
            Ok(pinned)
        });
        let pinned = match pinned {
            Ok(pinned) => pinned,
            Err(err) => {
                flag.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        tracing::trace!("transaction started");
        Ok(Self {
            db: db.clone(),
            pinned,
            state: TransactionState::Active,
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Execute a statement inside the transaction
    pub fn raw_sql(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        self.ensure_active()?;
        self.db.raw_sql_on(self.executor(), sql, values)
    }

    /// Execute a script inside the transaction
    pub fn raw_sql_script(&self, sql: &str) -> Result<Cursor> {
        self.ensure_active()?;
        self.db.raw_sql_script_on(self.executor(), sql)
    }

    /// Execute a statement and return rows keyed by column name
    pub fn sql(&self, sql: &str, values: &[Value]) -> Result<Vec<HashMap<String, Value>>> {
        Ok(self.raw_sql(sql, values)?.into_maps())
    }

    pub fn commit(mut self) -> Result<()> {
        self.finish(TransactionState::Committed)
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finish(TransactionState::RolledBack)
    }

    fn executor(&self) -> &dyn Executor {
        match &self.pinned {
            Some(pinned) => pinned.as_ref(),
            None => self.db.executor(),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(OrmError::Execution("No active transaction".into()));
        }
        Ok(())
    }

    fn finish(&mut self, outcome: TransactionState) -> Result<()> {
        self.ensure_active()?;
        self.state = outcome;

        let result = match outcome {
            TransactionState::Committed => self.executor().commit(),
            _ => self.executor().rollback(),
        };
        // Auto-commit resumes even when the driver refused to finish
        self.db.transaction_flag().store(false, Ordering::SeqCst);

        tracing::debug!(state = ?outcome, ok = result.is_ok(), "transaction finished");
        result
    }
}

impl Session for Transaction {
    fn database(&self) -> &Database {
        &self.db
    }

    fn raw_sql(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        Transaction::raw_sql(self, sql, values)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.finish(TransactionState::RolledBack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.raw_sql_script("CREATE TABLE t (id INTEGER)").unwrap();
        db
    }

    fn count(db: &Database) -> i64 {
        db.raw_sql("SELECT COUNT(*) FROM t", &[])
            .unwrap()
            .scalar()
            .and_then(Value::as_i64)
            .unwrap()
    }

    #[test]
    fn test_transaction_lifecycle() {
        let db = setup();

        let tx = db.begin().unwrap();
        assert!(tx.is_active());
        assert!(db.in_transaction());

        tx.raw_sql("INSERT INTO t (id) VALUES (?)", &[Value::Integer(1)])
            .unwrap();
        tx.commit().unwrap();

        assert!(!db.in_transaction());
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn test_transaction_rollback() {
        let db = setup();

        let tx = db.begin().unwrap();
        tx.raw_sql("INSERT INTO t (id) VALUES (?)", &[Value::Integer(1)])
            .unwrap();
        tx.rollback().unwrap();

        assert_eq!(count(&db), 0);
    }

    #[test]
    fn test_auto_rollback_on_drop() {
        let db = setup();

        {
            let tx = db.begin().unwrap();
            tx.raw_sql("INSERT INTO t (id) VALUES (?)", &[Value::Integer(1)])
                .unwrap();
        }

        assert!(!db.in_transaction());
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn test_nested_begin_rejected() {
        let db = setup();

        let tx = db.begin().unwrap();
        assert!(matches!(db.begin(), Err(OrmError::Execution(_))));
        tx.commit().unwrap();

        assert!(db.begin().is_ok());
    }
}
