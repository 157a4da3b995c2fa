use std::fmt;

use super::result_set::ResultSet;
use super::row::Row;
use crate::driver::CursorBackend;
use crate::error::DbError;
use crate::statement::Statement;

/// Forward-only, lazily fetched query result.
///
/// Each [`fetch`](Cursor::fetch) pulls one row from the driver. When the data
/// is exhausted `fetch` returns a null [`Row`] and the cursor closes itself;
/// exhaustion is not an error. The cursor keeps its statement (and through it
/// the connection) alive.
///
/// `Cursor` is also an [`Iterator`] over `Result<Row, DbError>`.
#[derive(Default)]
pub struct Cursor {
    inner: Option<Box<dyn CursorBackend>>,
    _statement: Option<Statement>,
}

impl Cursor {
    pub fn new<C>(backend: C) -> Self
    where
        C: CursorBackend + 'static,
    {
        Self::from_boxed(Box::new(backend))
    }

    #[must_use]
    pub fn from_boxed(backend: Box<dyn CursorBackend>) -> Self {
        Self {
            inner: Some(backend),
            _statement: None,
        }
    }

    pub(crate) fn with_statement(mut self, statement: Statement) -> Self {
        self._statement = Some(statement);
        self
    }

    /// True once the cursor is exhausted, failed, or was never opened.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Next row, or a null row when there is no more data.
    ///
    /// # Errors
    /// Propagates driver errors; the cursor is closed afterwards.
    pub fn fetch(&mut self) -> Result<Row, DbError> {
        let Some(backend) = self.inner.as_mut() else {
            return Ok(Row::default());
        };
        match backend.fetch() {
            Ok(row) => {
                if row.is_null() {
                    self.close();
                }
                Ok(row)
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Release the driver cursor early.
    pub fn close(&mut self) {
        self.inner = None;
        self._statement = None;
    }
}

impl Iterator for Cursor {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fetch() {
            Ok(row) if row.is_null() => None,
            other => Some(other),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Cursor over an already materialized [`ResultSet`], for drivers that
/// cannot stream.
#[derive(Debug, Clone)]
pub struct MaterializedCursor {
    result: ResultSet,
    next: usize,
}

impl MaterializedCursor {
    #[must_use]
    pub fn new(result: ResultSet) -> Self {
        Self { result, next: 0 }
    }
}

impl CursorBackend for MaterializedCursor {
    fn fetch(&mut self) -> Result<Row, DbError> {
        if self.next >= self.result.len() {
            return Ok(Row::default());
        }
        let row = self.result.row(self.next)?;
        self.next += 1;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::MemResult;
    use crate::types::SqlValue;

    #[test]
    fn drains_then_closes() -> Result<(), DbError> {
        let mut result = MemResult::new(vec!["n".into()]);
        for n in 0..3 {
            result.push_row(vec![SqlValue::Int(n)]);
        }
        let mut cursor = Cursor::new(MaterializedCursor::new(result.into_result_set()));

        let mut seen = Vec::new();
        for row in cursor.by_ref() {
            seen.push(row?.get::<i64>(0)?);
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(cursor.is_closed());
        assert!(cursor.fetch()?.is_null());
        Ok(())
    }

    #[test]
    fn default_cursor_is_closed() -> Result<(), DbError> {
        let mut cursor = Cursor::default();
        assert!(cursor.is_closed());
        assert!(cursor.fetch()?.is_null());
        Ok(())
    }
}
