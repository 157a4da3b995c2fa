use std::time::Duration;

use tracing::debug;

use super::connection::SqliteConnection;
use crate::driver::{ConnectionBackend, ConnectionManager};
use crate::error::DbError;

/// Options applied to every connection a [`SqliteManager`] opens.
#[derive(Debug, Clone, Default)]
pub struct SqliteOptions {
    pub wal: bool,
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

/// Connection manager for `sqlite:<path>` URLs. `sqlite::memory:` opens a
/// private in-memory database.
///
/// ```rust
/// let conn = sql_portal::connect("sqlite::memory:")?;
/// assert_eq!(conn.select_value("select 1 + 1")?.get_i64()?, 2);
/// # Ok::<(), sql_portal::DbError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqliteManager {
    options: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    /// Open a connection to `path`.
    ///
    /// # Errors
    /// Returns `DbError::ConnectionError` if the database cannot be opened,
    /// the connection options cannot be applied or the worker cannot start.
    pub fn open(&self, path: &str) -> Result<SqliteConnection, DbError> {
        let conn = if path.is_empty() || path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|e| DbError::ConnectionError(format!("failed to open SQLite database {path}: {e}")))?;

        if let Some(timeout) = self.options.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        if self.options.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        debug!(path, wal = self.options.wal, "opened SQLite connection");
        SqliteConnection::new(conn)
    }
}

impl ConnectionManager for SqliteManager {
    fn connect(
        &self,
        url: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Box<dyn ConnectionBackend>, DbError> {
        Ok(Box::new(self.open(url)?))
    }
}
