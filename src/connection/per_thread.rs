use super::Executor;
use crate::core::{OrmError, Result, Value};
use crate::result::Cursor;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

type Factory<E> = Box<dyn Fn() -> Result<E> + Send + Sync>;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// This thread's connections, keyed by executor id. Dropped with the thread.
    static CONNECTIONS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// A thread's connection; leaving the open count when dropped
struct Slot<E> {
    conn: Arc<E>,
    open: Arc<AtomicUsize>,
}

impl<E> Drop for Slot<E> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opens one backing executor per calling thread.
///
/// For drivers whose connections must not be shared across threads. Each
/// thread lazily gets its own connection from the factory on first use and
/// releases it when the thread exits; the rest of the crate sees a single
/// `Executor`.
///
/// With an in-memory SQLite path every thread sees a different database,
/// so this is meant for file-backed stores.
pub struct PerThreadExecutor<E> {
    id: u64,
    factory: Factory<E>,
    open: Arc<AtomicUsize>,
    placeholder: &'static str,
    _conn: PhantomData<fn() -> E>,
}

impl<E: Executor + 'static> PerThreadExecutor<E> {
    /// Create the executor and open the calling thread's connection.
    pub fn new<F>(factory: F) -> Result<Self>
    where
        F: Fn() -> Result<E> + Send + Sync + 'static,
    {
        let first = factory()?;
        let executor = Self {
            id: NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed),
            placeholder: first.placeholder(),
            factory: Box::new(factory),
            open: Arc::new(AtomicUsize::new(0)),
            _conn: PhantomData,
        };
        executor.store(Arc::new(first))?;
        Ok(executor)
    }

    /// The calling thread's connection, opened on first use
    pub fn connection(&self) -> Result<Arc<E>> {
        let cached = CONNECTIONS
            .try_with(|slots| {
                slots
                    .borrow()
                    .get(&self.id)
                    .and_then(|slot| slot.downcast_ref::<Slot<E>>())
                    .map(|slot| Arc::clone(&slot.conn))
            })
            .map_err(|_| storage_gone())?;

        if let Some(conn) = cached {
            return Ok(conn);
        }

        let conn = Arc::new((self.factory)()?);
        tracing::debug!(thread = ?std::thread::current().id(), "opened per-thread connection");
        self.store(Arc::clone(&conn))?;
        Ok(conn)
    }

    /// Number of live threads currently holding a connection
    pub fn connection_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Drop the calling thread's connection; the next use opens a new one
    pub fn release_current_thread(&self) -> Result<()> {
        let released = CONNECTIONS
            .try_with(|slots| slots.borrow_mut().remove(&self.id))
            .map_err(|_| storage_gone())?;
        drop(released);
        Ok(())
    }

    fn store(&self, conn: Arc<E>) -> Result<()> {
        self.open.fetch_add(1, Ordering::SeqCst);
        let slot = Slot {
            conn,
            open: Arc::clone(&self.open),
        };
        let replaced = CONNECTIONS
            .try_with(|slots| slots.borrow_mut().insert(self.id, Box::new(slot)))
            .map_err(|_| storage_gone())?;
        drop(replaced);
        Ok(())
    }
}

impl<E> Drop for PerThreadExecutor<E> {
    fn drop(&mut self) {
        // Other threads free theirs on exit
        let _ = CONNECTIONS.try_with(|slots| slots.borrow_mut().remove(&self.id));
    }
}

fn storage_gone() -> OrmError {
    OrmError::Execution("Thread-local connection storage is no longer available".into())
}

impl<E: Executor + 'static> Executor for PerThreadExecutor<E> {
    fn execute(&self, sql: &str, values: &[Value]) -> Result<Cursor> {
        self.connection()?.execute(sql, values)
    }

    fn execute_script(&self, sql: &str) -> Result<Cursor> {
        self.connection()?.execute_script(sql)
    }

    fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    fn begin(&self) -> Result<()> {
        self.connection()?.begin()
    }

    fn commit(&self) -> Result<()> {
        self.connection()?.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.connection()?.rollback()
    }

    fn pin(&self) -> Result<Option<Arc<dyn Executor>>> {
        let conn: Arc<dyn Executor> = self.connection()?;
        Ok(Some(conn))
    }
}
