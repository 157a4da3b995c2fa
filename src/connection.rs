use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::driver::ConnectionBackend;
use crate::error::DbError;
use crate::pool::PoolShared;
use crate::results::{ResultSet, Row, Value};
use crate::statement::Statement;
use crate::sync::lock;
use crate::transaction::Transaction;

/// Shared handle to one live database connection.
///
/// Clones refer to the same connection. The connection is closed when the
/// last clone is dropped, or handed back to its pool if it came from one.
/// A single connection must not be used by two threads at the same time;
/// calls are serialized on an internal lock.
#[derive(Clone, Default)]
pub struct Connection {
    inner: Option<Arc<ConnectionInner>>,
}

struct ConnectionInner {
    backend: Mutex<Option<Box<dyn ConnectionBackend>>>,
    /// Set by `begin_transaction`, cleared by a successful commit or rollback.
    in_transaction: AtomicBool,
    pool: Option<Weak<PoolShared>>,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        let backend = match self.backend.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(backend) = backend else {
            return;
        };
        match self.pool.as_ref().and_then(Weak::upgrade) {
            Some(pool) => pool.release(backend, *self.in_transaction.get_mut()),
            None => debug!("closing connection"),
        }
    }
}

impl Connection {
    /// Wrap a driver connection that is not pooled.
    #[must_use]
    pub fn from_backend(backend: Box<dyn ConnectionBackend>) -> Self {
        Self::wrap(backend, None)
    }

    pub(crate) fn pooled(backend: Box<dyn ConnectionBackend>, pool: Weak<PoolShared>) -> Self {
        Self::wrap(backend, Some(pool))
    }

    fn wrap(backend: Box<dyn ConnectionBackend>, pool: Option<Weak<PoolShared>>) -> Self {
        Self {
            inner: Some(Arc::new(ConnectionInner {
                backend: Mutex::new(Some(backend)),
                in_transaction: AtomicBool::new(false),
                pool,
            })),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// True when the connection goes back to a pool on release.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.inner.as_ref().is_some_and(|c| c.pool.is_some())
    }

    /// True when both handles refer to the same live connection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn set_in_transaction(&self, open: bool) {
        if let Some(inner) = &self.inner {
            inner.in_transaction.store(open, Ordering::SeqCst);
        }
    }

    fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut dyn ConnectionBackend) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let inner = self
            .inner
            .as_ref()
            .ok_or(DbError::NullHandle("connection"))?;
        let mut slot = lock(&inner.backend);
        let backend = slot.as_mut().ok_or(DbError::NullHandle("connection"))?;
        f(&mut **backend)
    }

    /// Start a transaction. A pooled connection still inside it when released
    /// is rolled back before the pool hands it out again.
    ///
    /// # Errors
    /// `DbError::NullHandle` on an empty handle; the driver's error otherwise.
    pub fn begin_transaction(&self) -> Result<(), DbError> {
        self.with_backend(|b| b.begin_transaction())?;
        self.set_in_transaction(true);
        Ok(())
    }

    /// # Errors
    /// `DbError::NullHandle` on an empty handle; the driver's error otherwise.
    pub fn commit_transaction(&self) -> Result<(), DbError> {
        self.with_backend(|b| b.commit_transaction())?;
        self.set_in_transaction(false);
        Ok(())
    }

    /// # Errors
    /// `DbError::NullHandle` on an empty handle; the driver's error otherwise.
    pub fn rollback_transaction(&self) -> Result<(), DbError> {
        self.with_backend(|b| b.rollback_transaction())?;
        self.set_in_transaction(false);
        Ok(())
    }

    /// Start a [`Transaction`] on this connection.
    ///
    /// # Errors
    /// Returns the error of `begin_transaction`.
    pub fn transaction(&self) -> Result<Transaction, DbError> {
        Transaction::begin_on(self.clone())
    }

    /// Run `sql` and return the number of affected rows.
    ///
    /// # Errors
    /// `DbError::Sql` if the engine rejects `sql`.
    pub fn execute(&self, sql: &str) -> Result<u64, DbError> {
        self.with_backend(|b| b.execute(sql))
    }

    /// # Errors
    /// `DbError::Sql` if the engine rejects `sql`.
    pub fn select(&self, sql: &str) -> Result<ResultSet, DbError> {
        self.with_backend(|b| b.select(sql))
    }

    /// First row of `sql`. Extra rows are discarded unless the driver decides
    /// otherwise.
    ///
    /// # Errors
    /// `DbError::NotFound` when there is no row; `DbError::Sql` if the
    /// engine rejects `sql`.
    pub fn select_row(&self, sql: &str) -> Result<Row, DbError> {
        self.with_backend(|b| b.select_row(sql))
    }

    /// First column of [`select_row`](Connection::select_row).
    ///
    /// # Errors
    /// As `select_row`, plus `DbError::FieldNotFound` for a row without columns.
    pub fn select_value(&self, sql: &str) -> Result<Value, DbError> {
        self.with_backend(|b| b.select_value(sql))
    }

    /// Prepare `sql`, which may contain `:name` host variables.
    ///
    /// # Errors
    /// `DbError::Sql` if the engine cannot compile `sql`.
    pub fn prepare(&self, sql: &str) -> Result<Statement, DbError> {
        let stmt = self.with_backend(|b| b.prepare(sql))?;
        Ok(stmt.with_connection(self.clone()))
    }

    /// Prepare `sql` with the driver's pagination clause. `limit` and
    /// `offset` are host variable names; pass an empty `offset` to omit it.
    ///
    /// # Errors
    /// As [`prepare`](Connection::prepare).
    pub fn prepare_with_limit(
        &self,
        sql: &str,
        limit: &str,
        offset: &str,
    ) -> Result<Statement, DbError> {
        let stmt = self.with_backend(|b| b.prepare_with_limit(sql, limit, offset))?;
        Ok(stmt.with_connection(self.clone()))
    }

    /// Round trip to the server; false for a dead or empty connection.
    #[must_use]
    pub fn ping(&self) -> bool {
        self.with_backend(|b| Ok(b.ping())).unwrap_or(false)
    }

    /// Key generated by the last insert; `name` is the sequence on engines
    /// that use them.
    ///
    /// # Errors
    /// `DbError::Unimplemented` on drivers without generated keys.
    pub fn last_insert_id(&self, name: &str) -> Result<i64, DbError> {
        self.with_backend(|b| b.last_insert_id(name))
    }

    /// Lock `table` until the current transaction ends.
    ///
    /// # Errors
    /// The driver's error if the lock cannot be taken.
    pub fn lock_table(&self, table: &str, exclusive: bool) -> Result<(), DbError> {
        self.with_backend(|b| b.lock_table(table, exclusive))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Connection")
                .field("pooled", &inner.pool.is_some())
                .finish_non_exhaustive(),
            None => f.write_str("Connection(<empty>)"),
        }
    }
}
