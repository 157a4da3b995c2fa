use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::blob::Blob;
use crate::connection::Connection;
use crate::driver::{SharedStatement, StatementBackend};
use crate::error::DbError;
use crate::results::{Cursor, ResultSet, Row, Value};
use crate::sync::lock;
use crate::types::SqlValue;

/// A prepared statement and its bound host variables.
///
/// Clones share the prepared statement and its bindings. A statement obtained
/// from [`Connection::prepare`] keeps that connection alive, so a pooled
/// connection is not returned to its pool while statements on it exist.
///
/// Setters return `&Self` so bindings chain:
///
/// ```rust,no_run
/// # fn demo(conn: &sql_portal::Connection) -> Result<(), sql_portal::DbError> {
/// let stmt = conn.prepare("insert into t(a, b) values(:a, :b)")?;
/// stmt.bind("a", 42)?.bind("b", "hi")?.execute()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Statement {
    inner: Option<SharedStatement>,
    conn: Option<Connection>,
}

macro_rules! typed_setters {
    ($($name:ident($ty:ty)),* $(,)?) => {
        $(
            /// Bind a typed value to host variable `name`.
            ///
            /// # Errors
            /// As [`bind`](Statement::bind).
            pub fn $name(&self, name: &str, value: $ty) -> Result<&Self, DbError> {
                lock(self.backend()?).$name(name, value)?;
                Ok(self)
            }
        )*
    };
}

impl Statement {
    pub fn new<S>(backend: S) -> Self
    where
        S: StatementBackend + 'static,
    {
        Self::from_shared(Arc::new(Mutex::new(backend)))
    }

    #[must_use]
    pub fn from_shared(backend: SharedStatement) -> Self {
        Self {
            inner: Some(backend),
            conn: None,
        }
    }

    pub(crate) fn with_connection(mut self, conn: Connection) -> Self {
        self.conn = Some(conn);
        self
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// The connection this statement was prepared on, if any.
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn backend(&self) -> Result<&Mutex<dyn StatementBackend>, DbError> {
        self.inner.as_deref().ok_or(DbError::NullHandle("statement"))
    }

    /// True when both handles refer to the same prepared statement.
    #[must_use]
    pub fn ptr_eq(&self, other: &Statement) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Forget all bindings.
    ///
    /// # Errors
    /// `DbError::NullHandle` on an empty handle.
    pub fn clear(&self) -> Result<&Self, DbError> {
        lock(self.backend()?).clear();
        Ok(self)
    }

    /// Bind anything convertible to [`SqlValue`] to host variable `name`.
    ///
    /// # Errors
    /// `DbError::NullHandle` on an empty handle; drivers may reject a value
    /// they cannot store.
    pub fn bind(&self, name: &str, value: impl Into<SqlValue>) -> Result<&Self, DbError> {
        lock(self.backend()?).set_value(name, value.into())?;
        Ok(self)
    }

    /// # Errors
    /// As [`bind`](Statement::bind).
    pub fn set_null(&self, name: &str) -> Result<&Self, DbError> {
        lock(self.backend()?).set_null(name)?;
        Ok(self)
    }

    typed_setters! {
        set_bool(bool),
        set_i32(i32),
        set_i64(i64),
        set_u32(u32),
        set_u64(u64),
        set_f32(f32),
        set_f64(f64),
        set_char(char),
        set_string(&str),
        set_blob(&Blob),
        set_date(NaiveDate),
        set_time(NaiveTime),
        set_datetime(NaiveDateTime),
        set_decimal(Decimal),
    }

    /// Execute, returning the number of affected rows.
    ///
    /// # Errors
    /// `DbError::Sql` if the engine fails to run the statement.
    pub fn execute(&self) -> Result<u64, DbError> {
        lock(self.backend()?).execute()
    }

    /// # Errors
    /// `DbError::Sql` if the engine fails to run the statement.
    pub fn select(&self) -> Result<ResultSet, DbError> {
        lock(self.backend()?).select()
    }

    /// First result row.
    ///
    /// # Errors
    /// `DbError::NotFound` if there is none; `DbError::Sql` from the engine.
    pub fn select_row(&self) -> Result<Row, DbError> {
        lock(self.backend()?).select_row()
    }

    /// First column of [`select_row`](Statement::select_row).
    ///
    /// # Errors
    /// As `select_row`.
    pub fn select_value(&self) -> Result<Value, DbError> {
        lock(self.backend()?).select_value()
    }

    /// Execute and fetch lazily. `fetch_size` is a hint for the driver.
    ///
    /// # Errors
    /// `DbError::Sql` if the statement cannot be started; errors on later
    /// rows surface from [`Cursor::fetch`].
    pub fn cursor(&self, fetch_size: u32) -> Result<Cursor, DbError> {
        let backend = lock(self.backend()?).create_cursor(fetch_size)?;
        Ok(Cursor::from_boxed(backend).with_statement(self.clone()))
    }

    /// Ask the driver to defer up to `n` executions; returns the limit it
    /// accepted (0 when batching is unsupported).
    ///
    /// # Errors
    /// `DbError::NullHandle` on an empty handle.
    pub fn max_num_delay(&self, n: u32) -> Result<u32, DbError> {
        Ok(lock(self.backend()?).max_num_delay(n))
    }

    /// # Errors
    /// `DbError::NullHandle` on an empty handle.
    pub fn num_delayed(&self) -> Result<u32, DbError> {
        Ok(lock(self.backend()?).num_delayed())
    }

    /// Send deferred executions now.
    ///
    /// # Errors
    /// The driver's error for the first deferred execution that fails.
    pub fn flush(&self) -> Result<u32, DbError> {
        lock(self.backend()?).flush()
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Statement {}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("null", &self.is_null())
            .field("connection", &self.conn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::driver::CursorBackend;
    use crate::results::{MaterializedCursor, MemResult};

    /// Echoes its bindings back as a one-row result.
    #[derive(Default)]
    struct Echo {
        bound: HashMap<String, SqlValue>,
        executions: u64,
    }

    impl Echo {
        fn result(&self) -> ResultSet {
            let mut names: Vec<String> = self.bound.keys().cloned().collect();
            names.sort();
            let values = names.iter().map(|n| self.bound[n].clone()).collect();
            let mut result = MemResult::new(names);
            result.push_row(values);
            result.into_result_set()
        }
    }

    impl StatementBackend for Echo {
        fn clear(&mut self) {
            self.bound.clear();
        }

        fn set_value(&mut self, name: &str, value: SqlValue) -> Result<(), DbError> {
            self.bound.insert(name.to_string(), value);
            Ok(())
        }

        fn execute(&mut self) -> Result<u64, DbError> {
            self.executions += 1;
            Ok(self.executions)
        }

        fn select(&mut self) -> Result<ResultSet, DbError> {
            Ok(self.result())
        }

        fn create_cursor(&mut self, _fetch_size: u32) -> Result<Box<dyn CursorBackend>, DbError> {
            Ok(Box::new(MaterializedCursor::new(self.result())))
        }
    }

    #[test]
    fn chained_bindings_reach_backend() -> Result<(), DbError> {
        let stmt = Statement::new(Echo::default());
        let row = stmt.bind("a", 42)?.set_string("b", "hi")?.select_row()?;
        assert_eq!(row.get_by_name::<i64>("a")?, 42);
        assert_eq!(row.get_by_name::<String>("b")?, "hi");

        stmt.clear()?.set_null("c")?;
        assert!(stmt.select_value()?.is_null());
        Ok(())
    }

    #[test]
    fn clones_share_the_prepared_statement() -> Result<(), DbError> {
        let stmt = Statement::new(Echo::default());
        let other = stmt.clone();
        assert_eq!(stmt, other);
        assert_eq!(stmt.execute()?, 1);
        assert_eq!(other.execute()?, 2);
        assert_ne!(stmt, Statement::new(Echo::default()));
        Ok(())
    }

    #[test]
    fn batching_defaults_to_disabled() -> Result<(), DbError> {
        let stmt = Statement::new(Echo::default());
        assert_eq!(stmt.max_num_delay(10)?, 0);
        assert_eq!(stmt.num_delayed()?, 0);
        assert_eq!(stmt.flush()?, 0);
        Ok(())
    }

    #[test]
    fn cursor_walks_rows() -> Result<(), DbError> {
        let stmt = Statement::new(Echo::default());
        stmt.bind("x", 1)?;
        let rows = stmt.cursor(16)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[test]
    fn empty_handle() {
        let stmt = Statement::default();
        assert!(stmt.is_null());
        assert!(matches!(stmt.execute(), Err(DbError::NullHandle("statement"))));
    }
}
