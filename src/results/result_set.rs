use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::row::{MemRow, Row, index_columns};
use crate::driver::{ResultBackend, RowBackend};
use crate::error::DbError;
use crate::types::SqlValue;

/// An eagerly materialized query result.
///
/// Like the other façades this is a shared handle; cloning does not copy rows.
#[derive(Clone, Default)]
pub struct ResultSet {
    inner: Option<Arc<dyn ResultBackend>>,
}

impl ResultSet {
    pub fn new<R>(backend: R) -> Self
    where
        R: ResultBackend + 'static,
    {
        Self {
            inner: Some(Arc::new(backend)),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    fn backend(&self) -> Result<&dyn ResultBackend, DbError> {
        self.inner.as_deref().ok_or(DbError::NullHandle("result"))
    }

    /// Number of rows; 0 for an empty handle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |r| r.size())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_count(&self) -> Result<usize, DbError> {
        Ok(self.backend()?.field_count())
    }

    /// Row at `index`.
    ///
    /// # Errors
    /// `NotFound` when `index` is out of range.
    pub fn row(&self, index: usize) -> Result<Row, DbError> {
        self.backend()?.get_row(index)
    }

    /// First row, or `NotFound` for an empty result.
    pub fn first_row(&self) -> Result<Row, DbError> {
        let backend = self.backend()?;
        if backend.size() == 0 {
            Err(DbError::NotFound)
        } else {
            backend.get_row(0)
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = Result<Row, DbError>> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(r) => f.debug_tuple("ResultSet").field(r).finish(),
            None => f.write_str("ResultSet(<empty>)"),
        }
    }
}

/// In-memory result backend built row by row.
///
/// ```rust
/// use sql_portal::{MemResult, SqlValue};
///
/// let mut result = MemResult::new(vec!["id".into(), "name".into()]);
/// result.push_row(vec![SqlValue::Int(1), SqlValue::Text("alice".into())]);
/// let rs = result.into_result_set();
/// assert_eq!(rs.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemResult {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    rows: Vec<Arc<MemRow>>,
}

impl MemResult {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names: Arc::new(column_names),
            column_index,
            rows: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append a row; values are in column order.
    pub fn push_row(&mut self, values: Vec<SqlValue>) {
        let row = MemRow::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        );
        self.rows.push(Arc::new(row));
    }

    #[must_use]
    pub fn into_result_set(self) -> ResultSet {
        ResultSet::new(self)
    }
}

impl ResultBackend for MemResult {
    fn size(&self) -> usize {
        self.rows.len()
    }

    fn field_count(&self) -> usize {
        self.column_names.len()
    }

    fn get_row(&self, index: usize) -> Result<Row, DbError> {
        let row = self.rows.get(index).ok_or(DbError::NotFound)?;
        let backend: Arc<dyn RowBackend> = Arc::clone(row) as Arc<dyn RowBackend>;
        Ok(Row::from_shared(backend))
    }
}
