use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::driver::{
    ConnectionBackend, ConnectionManager, CursorBackend, StatementBackend, ValueBackend,
};
use crate::error::DbError;
use crate::results::{MemResult, MemRow, ResultSet, Row};
use crate::statement::Statement;
use crate::types::SqlValue;

macro_rules! counters {
    ($($name:ident),* $(,)?) => {
        /// Calls observed by every connection of one [`MockManager`].
        #[derive(Debug, Default)]
        pub struct MockStats {
            $($name: AtomicUsize,)*
        }

        impl MockStats {
            $(
                #[must_use]
                pub fn $name(&self) -> usize {
                    self.$name.load(Ordering::SeqCst)
                }
            )*
        }
    };
}

counters!(
    connects, closes, prepares, executes, selects, begins, commits, rollbacks, fetches, locks,
);

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Connection manager for `mock:` URLs.
///
/// Clones share counters and switches, so a test keeps one clone and
/// registers another.
#[derive(Debug, Clone)]
pub struct MockManager {
    stats: Arc<MockStats>,
    fail_connect: Arc<AtomicBool>,
    ping_ok: Arc<AtomicBool>,
    fail_rollback: Arc<AtomicBool>,
}

impl Default for MockManager {
    fn default() -> Self {
        Self {
            stats: Arc::default(),
            fail_connect: Arc::default(),
            ping_ok: Arc::new(AtomicBool::new(true)),
            fail_rollback: Arc::default(),
        }
    }
}

impl MockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> &MockStats {
        &self.stats
    }

    /// Make new connects fail with `ConnectionError`.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Result of `ping` on every connection.
    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    /// Make `rollback_transaction` fail.
    pub fn set_fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// A connection that is not registered anywhere.
    #[must_use]
    pub fn open(&self) -> MockConnection {
        bump(&self.stats.connects);
        MockConnection {
            manager: self.clone(),
            in_transaction: false,
        }
    }
}

impl ConnectionManager for MockManager {
    fn connect(
        &self,
        url: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Box<dyn ConnectionBackend>, DbError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DbError::ConnectionError(format!("mock refused {url}")));
        }
        Ok(Box::new(self.open()))
    }
}

/// Mock connection. `select` returns one row holding the SQL text.
#[derive(Debug)]
pub struct MockConnection {
    manager: MockManager,
    in_transaction: bool,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        bump(&self.manager.stats.closes);
    }
}

impl ConnectionBackend for MockConnection {
    fn begin_transaction(&mut self) -> Result<(), DbError> {
        bump(&self.manager.stats.begins);
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), DbError> {
        bump(&self.manager.stats.commits);
        self.in_transaction = false;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), DbError> {
        if self.manager.fail_rollback.load(Ordering::SeqCst) {
            return Err(DbError::sql("ROLLBACK", "mock rollback failure"));
        }
        bump(&self.manager.stats.rollbacks);
        self.in_transaction = false;
        Ok(())
    }

    fn execute(&mut self, _sql: &str) -> Result<u64, DbError> {
        bump(&self.manager.stats.executes);
        Ok(1)
    }

    fn select(&mut self, sql: &str) -> Result<ResultSet, DbError> {
        bump(&self.manager.stats.selects);
        let mut result = MemResult::new(vec!["sql".to_string()]);
        result.push_row(vec![SqlValue::from(sql)]);
        Ok(result.into_result_set())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        bump(&self.manager.stats.prepares);
        Ok(Statement::new(MockStatement {
            sql: sql.to_string(),
            bound: HashMap::new(),
            stats: Arc::clone(&self.manager.stats),
        }))
    }

    fn ping(&mut self) -> bool {
        self.manager.ping_ok.load(Ordering::SeqCst)
    }

    fn last_insert_id(&mut self, _name: &str) -> Result<i64, DbError> {
        i64::try_from(self.manager.stats.executes())
            .map_err(|e| DbError::TypeError(e.to_string()))
    }

    fn lock_table(&mut self, _table: &str, _exclusive: bool) -> Result<(), DbError> {
        bump(&self.manager.stats.locks);
        Ok(())
    }

    fn in_transaction(&mut self) -> bool {
        self.in_transaction
    }
}

/// Mock statement. Queries yield as many rows as the `rows` host variable
/// says (default 1); each row has columns `n` (0-based row number) and `sql`.
#[derive(Debug)]
pub struct MockStatement {
    sql: String,
    bound: HashMap<String, SqlValue>,
    stats: Arc<MockStats>,
}

impl MockStatement {
    #[must_use]
    pub fn bound(&self, name: &str) -> Option<&SqlValue> {
        self.bound.get(name)
    }

    fn row_count(&self) -> Result<i64, DbError> {
        match self.bound.get("rows") {
            Some(rows) => rows.get_i64(),
            None => Ok(1),
        }
    }
}

fn mock_row(columns: &Arc<Vec<String>>, n: i64, sql: &str) -> MemRow {
    MemRow::new(
        Arc::clone(columns),
        vec![SqlValue::Int(n), SqlValue::from(sql)],
    )
}

fn mock_columns() -> Vec<String> {
    vec!["n".to_string(), "sql".to_string()]
}

impl StatementBackend for MockStatement {
    fn clear(&mut self) {
        self.bound.clear();
    }

    fn set_value(&mut self, name: &str, value: SqlValue) -> Result<(), DbError> {
        self.bound.insert(name.to_string(), value);
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, DbError> {
        bump(&self.stats.executes);
        Ok(1)
    }

    fn select(&mut self) -> Result<ResultSet, DbError> {
        bump(&self.stats.selects);
        let mut result = MemResult::new(mock_columns());
        for n in 0..self.row_count()? {
            result.push_row(vec![SqlValue::Int(n), SqlValue::from(self.sql.as_str())]);
        }
        Ok(result.into_result_set())
    }

    fn create_cursor(&mut self, _fetch_size: u32) -> Result<Box<dyn CursorBackend>, DbError> {
        Ok(Box::new(MockCursor {
            columns: Arc::new(mock_columns()),
            sql: self.sql.clone(),
            next: 0,
            total: self.row_count()?,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Lazy cursor: each row is built when fetched.
#[derive(Debug)]
pub struct MockCursor {
    columns: Arc<Vec<String>>,
    sql: String,
    next: i64,
    total: i64,
    stats: Arc<MockStats>,
}

impl CursorBackend for MockCursor {
    fn fetch(&mut self) -> Result<Row, DbError> {
        if self.next >= self.total {
            return Ok(Row::default());
        }
        bump(&self.stats.fetches);
        let row = mock_row(&self.columns, self.next, &self.sql);
        self.next += 1;
        Ok(row.into_row())
    }
}
