use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::params::positional_params;
use super::worker::{CursorId, SqliteWorker};
use crate::driver::{CursorBackend, StatementBackend};
use crate::error::DbError;
use crate::results::{MemRow, ResultSet, Row};
use crate::translation::RewrittenSql;
use crate::types::SqlValue;

/// Prepared statement on a SQLite connection.
///
/// Host variables are bound by name and sent as `?N` parameters. The compiled
/// statement lives in rusqlite's per-connection statement cache.
pub struct SqliteStatement {
    worker: Arc<SqliteWorker>,
    sql: RewrittenSql,
    bound: HashMap<String, SqlValue>,
}

impl SqliteStatement {
    pub(crate) fn new(worker: Arc<SqliteWorker>, sql: RewrittenSql) -> Self {
        Self {
            worker,
            sql,
            bound: HashMap::new(),
        }
    }

    /// The SQL as sent to SQLite.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql.sql
    }
}

impl StatementBackend for SqliteStatement {
    fn clear(&mut self) {
        self.bound.clear();
    }

    fn set_value(&mut self, name: &str, value: SqlValue) -> Result<(), DbError> {
        self.bound.insert(name.to_string(), value);
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, DbError> {
        let params = positional_params(&self.sql, &self.bound);
        self.worker.execute(&self.sql.sql, params, true)
    }

    fn select(&mut self) -> Result<ResultSet, DbError> {
        let params = positional_params(&self.sql, &self.bound);
        self.worker.select(&self.sql.sql, params, true)
    }

    // SQLite steps one row at a time, so the fetch size has nothing to batch.
    fn create_cursor(&mut self, _fetch_size: u32) -> Result<Box<dyn CursorBackend>, DbError> {
        let params = positional_params(&self.sql, &self.bound);
        let opened = self.worker.open_cursor(&self.sql.sql, params)?;
        Ok(Box::new(SqliteCursor {
            worker: Arc::clone(&self.worker),
            id: opened.id,
            columns: Arc::new(opened.columns),
            done: false,
        }))
    }
}

impl fmt::Debug for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql.sql)
            .field("params", &self.sql.params)
            .finish_non_exhaustive()
    }
}

/// Cursor stepping a live SQLite statement; each fetch reads one more row.
pub struct SqliteCursor {
    worker: Arc<SqliteWorker>,
    id: CursorId,
    columns: Arc<Vec<String>>,
    done: bool,
}

impl CursorBackend for SqliteCursor {
    fn fetch(&mut self) -> Result<Row, DbError> {
        if self.done {
            return Ok(Row::default());
        }
        match self.worker.fetch(self.id) {
            Ok(Some(values)) => Ok(MemRow::new(Arc::clone(&self.columns), values).into_row()),
            Ok(None) => {
                self.done = true;
                Ok(Row::default())
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        if !self.done {
            self.worker.close_cursor(self.id);
        }
    }
}

impl fmt::Debug for SqliteCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCursor")
            .field("id", &self.id)
            .field("columns", &self.columns)
            .field("done", &self.done)
            .finish()
    }
}
