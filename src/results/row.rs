use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::value::{FromValue, Value};
use crate::driver::{RowBackend, ValueBackend};
use crate::error::DbError;
use crate::types::SqlValue;

/// A row of a query result: values plus column names.
///
/// A `Row` is a view onto the driver's row object, not a copy. A null row
/// (no backend) is what a [`Cursor`](super::Cursor) hands out once the data is
/// exhausted; value getters on it fail with `DbError::NullHandle`.
#[derive(Clone, Default)]
pub struct Row {
    inner: Option<Arc<dyn RowBackend>>,
}

impl Row {
    pub fn new<R>(backend: R) -> Self
    where
        R: RowBackend + 'static,
    {
        Self {
            inner: Some(Arc::new(backend)),
        }
    }

    #[must_use]
    pub fn from_shared(backend: Arc<dyn RowBackend>) -> Self {
        Self {
            inner: Some(backend),
        }
    }

    /// True for the end-of-data sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    fn backend(&self) -> Result<&dyn RowBackend, DbError> {
        self.inner.as_deref().ok_or(DbError::NullHandle("row"))
    }

    /// Number of columns; 0 for a null row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |r| r.size())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at column `index`.
    ///
    /// # Errors
    /// `FieldNotFound` when `index` is out of range.
    pub fn value(&self, index: usize) -> Result<Value, DbError> {
        self.backend()?.get_value_by_number(index)
    }

    /// Value of the column named exactly `name`.
    ///
    /// # Errors
    /// `FieldNotFound` when no column has that name.
    pub fn value_by_name(&self, name: &str) -> Result<Value, DbError> {
        self.backend()?.get_value_by_name(name)
    }

    /// Value of the first column whose name matches `name` ignoring ASCII case.
    ///
    /// # Errors
    /// `FieldNotFound` when no column matches.
    pub fn value_by_name_ci(&self, name: &str) -> Result<Value, DbError> {
        let backend = self.backend()?;
        for index in 0..backend.size() {
            if backend.get_column_name(index)?.eq_ignore_ascii_case(name) {
                return backend.get_value_by_number(index);
            }
        }
        Err(DbError::FieldNotFound(name.to_string()))
    }

    pub fn column_name(&self, index: usize) -> Result<&str, DbError> {
        self.backend()?.get_column_name(index)
    }

    pub fn column_names(&self) -> Result<Vec<String>, DbError> {
        let backend = self.backend()?;
        (0..backend.size())
            .map(|i| backend.get_column_name(i).map(str::to_string))
            .collect()
    }

    /// Typed value at column `index`, e.g. `row.get::<String>(0)`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, DbError> {
        self.value(index)?.get()
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, DbError> {
        self.value_by_name(name)?.get()
    }

    /// All values in column order.
    pub fn values(&self) -> impl Iterator<Item = Result<Value, DbError>> + '_ {
        (0..self.len()).map(move |i| self.value(i))
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(r) => f.debug_tuple("Row").field(r).finish(),
            None => f.write_str("Row(<null>)"),
        }
    }
}

/// In-memory row backend.
///
/// Column names and their index are shared by every row of a result.
#[derive(Debug, Clone)]
pub struct MemRow {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    values: Vec<Arc<SqlValue>>,
}

impl MemRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self::with_index(column_names, column_index, values)
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<SqlValue>,
    ) -> Self {
        Self {
            column_names,
            column_index,
            values: values.into_iter().map(Arc::new).collect(),
        }
    }

    #[must_use]
    pub fn into_row(self) -> Row {
        Row::new(self)
    }
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // duplicate names resolve to the first column
        index.entry(name.clone()).or_insert(i);
    }
    index
}

impl RowBackend for MemRow {
    fn size(&self) -> usize {
        self.values.len()
    }

    fn get_value_by_number(&self, index: usize) -> Result<Value, DbError> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| DbError::FieldNotFound(format!("column #{index}")))?;
        let backend: Arc<dyn ValueBackend> = Arc::clone(value) as Arc<dyn ValueBackend>;
        Ok(Value::from_shared(backend))
    }

    fn get_column_name(&self, index: usize) -> Result<&str, DbError> {
        self.column_names
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| DbError::FieldNotFound(format!("column #{index}")))
    }

    fn get_value_by_name(&self, name: &str) -> Result<Value, DbError> {
        match self.column_index.get(name) {
            Some(&index) => self.get_value_by_number(index),
            None => Err(DbError::FieldNotFound(name.to_string())),
        }
    }
}
