use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Mutex;

use tracing::debug;

use crate::connection::Connection;
use crate::error::DbError;
use crate::statement::Statement;
use crate::sync::lock;

/// A [`Connection`] that remembers its prepared statements.
///
/// Preparing the same SQL text again returns the cached [`Statement`],
/// bindings included; call [`Statement::clear`] or rebind before reuse.
/// Every other connection operation is reached through `Deref`.
#[derive(Debug)]
pub struct CachingConnection {
    conn: Connection,
    cache: Mutex<HashMap<String, Statement>>,
}

impl CachingConnection {
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Cached prepare keyed on the SQL text.
    pub fn prepare(&self, sql: &str) -> Result<Statement, DbError> {
        self.cached(sql.to_string(), || self.conn.prepare(sql))
    }

    /// Cached paginated prepare, keyed on `sql`, `limit` and `offset`.
    pub fn prepare_with_limit(
        &self,
        sql: &str,
        limit: &str,
        offset: &str,
    ) -> Result<Statement, DbError> {
        let key = format!("{sql}\0{limit}\0{offset}");
        self.cached(key, || self.conn.prepare_with_limit(sql, limit, offset))
    }

    fn cached(
        &self,
        key: String,
        prepare: impl FnOnce() -> Result<Statement, DbError>,
    ) -> Result<Statement, DbError> {
        let mut cache = lock(&self.cache);
        if let Some(stmt) = cache.get(&key) {
            return Ok(stmt.clone());
        }
        debug!(sql = %key, "statement cache miss");
        let stmt = prepare()?;
        cache.insert(key, stmt.clone());
        Ok(stmt)
    }

    /// Forget all cached statements; the next prepare compiles anew.
    pub fn clear_statement_cache(&self) {
        lock(&self.cache).clear();
    }

    #[must_use]
    pub fn cached_statements_count(&self) -> usize {
        lock(&self.cache).len()
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl Deref for CachingConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl From<Connection> for CachingConnection {
    fn from(conn: Connection) -> Self {
        Self::new(conn)
    }
}
