use std::fmt;
use std::sync::Arc;

use crate::driver::ConnectionBackend;
use crate::error::DbError;
use crate::results::ResultSet;
use crate::statement::Statement;
use crate::translation::{PlaceholderStyle, rewrite_host_vars};

use super::statement::SqliteStatement;
use super::worker::SqliteWorker;

/// Connection backend for one SQLite database handle.
///
/// The rusqlite connection lives on a dedicated worker thread; this handle,
/// its statements and their cursors send it requests.
pub struct SqliteConnection {
    worker: Arc<SqliteWorker>,
}

impl SqliteConnection {
    /// Hand `conn` to a new worker thread.
    ///
    /// # Errors
    /// Returns `DbError::ConnectionError` if the worker thread cannot be spawned.
    pub fn new(conn: rusqlite::Connection) -> Result<Self, DbError> {
        Ok(Self {
            worker: Arc::new(SqliteWorker::spawn(conn)?),
        })
    }

    /// Run `func` against the raw rusqlite connection on the worker thread.
    ///
    /// # Errors
    /// Whatever `func` returns, or `DbError::ConnectionError` if the worker
    /// is gone.
    pub fn with_connection<F, R>(&self, func: F) -> Result<R, DbError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        self.worker.with_connection(func)
    }
}

impl ConnectionBackend for SqliteConnection {
    fn begin_transaction(&mut self) -> Result<(), DbError> {
        self.worker.execute_batch("BEGIN")
    }

    fn commit_transaction(&mut self) -> Result<(), DbError> {
        self.worker.execute_batch("COMMIT")
    }

    fn rollback_transaction(&mut self) -> Result<(), DbError> {
        self.worker.execute_batch("ROLLBACK")
    }

    fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        self.worker.execute(sql, Vec::new(), false)
    }

    fn select(&mut self, sql: &str) -> Result<ResultSet, DbError> {
        self.worker.select(sql, Vec::new(), false)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        let rewritten = rewrite_host_vars(sql, PlaceholderStyle::Sqlite);
        // compile once so syntax errors surface here; the handle stays cached
        self.worker.prepare(&rewritten.sql, sql)?;
        Ok(Statement::new(SqliteStatement::new(
            Arc::clone(&self.worker),
            rewritten,
        )))
    }

    fn ping(&mut self) -> bool {
        self.with_connection(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .is_ok()
    }

    fn last_insert_id(&mut self, _name: &str) -> Result<i64, DbError> {
        self.with_connection(|conn| Ok(conn.last_insert_rowid()))
    }

    // SQLite locks the whole database, not tables.
    fn lock_table(&mut self, _table: &str, _exclusive: bool) -> Result<(), DbError> {
        Ok(())
    }

    fn in_transaction(&mut self) -> bool {
        // an unreachable worker has nothing left to roll back
        self.with_connection(|conn| Ok(!conn.is_autocommit()))
            .unwrap_or(false)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("worker", &self.worker)
            .finish()
    }
}
