use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::blob::Blob;
use crate::driver::ValueBackend;
use crate::error::DbError;
use crate::types::SqlValue;

/// Handle to one database cell.
///
/// Copies share the driver's value object. A default-constructed `Value` has
/// no backend: [`is_empty`](Value::is_empty) reports it and every getter fails
/// with `DbError::NullHandle`.
#[derive(Clone, Default)]
pub struct Value {
    inner: Option<Arc<dyn ValueBackend>>,
}

impl Value {
    pub fn new<V>(backend: V) -> Self
    where
        V: ValueBackend + 'static,
    {
        Self {
            inner: Some(Arc::new(backend)),
        }
    }

    #[must_use]
    pub fn from_shared(backend: Arc<dyn ValueBackend>) -> Self {
        Self {
            inner: Some(backend),
        }
    }

    /// True when no backend is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// True for SQL NULL and for empty handles.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.as_ref().is_none_or(|v| v.is_null())
    }

    fn backend(&self) -> Result<&dyn ValueBackend, DbError> {
        self.inner.as_deref().ok_or(DbError::NullHandle("value"))
    }

    /// Typed extraction, e.g. `value.get::<i64>()`.
    ///
    /// # Errors
    /// Fails like the matching `get_*` method.
    pub fn get<T: FromValue>(&self) -> Result<T, DbError> {
        T::from_value(self)
    }

    pub fn get_bool(&self) -> Result<bool, DbError> {
        self.backend()?.get_bool()
    }

    pub fn get_i16(&self) -> Result<i16, DbError> {
        self.backend()?.get_i16()
    }

    pub fn get_i32(&self) -> Result<i32, DbError> {
        self.backend()?.get_i32()
    }

    pub fn get_i64(&self) -> Result<i64, DbError> {
        self.backend()?.get_i64()
    }

    pub fn get_u32(&self) -> Result<u32, DbError> {
        self.backend()?.get_u32()
    }

    pub fn get_u64(&self) -> Result<u64, DbError> {
        self.backend()?.get_u64()
    }

    pub fn get_f32(&self) -> Result<f32, DbError> {
        self.backend()?.get_f32()
    }

    pub fn get_f64(&self) -> Result<f64, DbError> {
        self.backend()?.get_f64()
    }

    pub fn get_char(&self) -> Result<char, DbError> {
        self.backend()?.get_char()
    }

    pub fn get_string(&self) -> Result<String, DbError> {
        self.backend()?.get_string()
    }

    pub fn get_blob(&self) -> Result<Blob, DbError> {
        self.backend()?.get_blob()
    }

    pub fn get_date(&self) -> Result<NaiveDate, DbError> {
        self.backend()?.get_date()
    }

    pub fn get_time(&self) -> Result<NaiveTime, DbError> {
        self.backend()?.get_time()
    }

    pub fn get_datetime(&self) -> Result<NaiveDateTime, DbError> {
        self.backend()?.get_datetime()
    }

    pub fn get_decimal(&self) -> Result<Decimal, DbError> {
        self.backend()?.get_decimal()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(v) => f.debug_tuple("Value").field(v).finish(),
            None => f.write_str("Value(<empty>)"),
        }
    }
}

impl From<SqlValue> for Value {
    fn from(v: SqlValue) -> Self {
        Value::new(v)
    }
}

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    /// # Errors
    /// `NullValue` on NULL, `TypeError` when the cell cannot be converted.
    fn from_value(value: &Value) -> Result<Self, DbError>;
}

macro_rules! impl_from_value {
    ($($ty:ty => $getter:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, DbError> {
                    value.$getter()
                }
            }
        )*
    };
}

impl_from_value! {
    bool => get_bool,
    i16 => get_i16,
    i32 => get_i32,
    i64 => get_i64,
    u32 => get_u32,
    u64 => get_u64,
    f32 => get_f32,
    f64 => get_f64,
    char => get_char,
    String => get_string,
    Blob => get_blob,
    NaiveDate => get_date,
    NaiveTime => get_time,
    NaiveDateTime => get_datetime,
    Decimal => get_decimal,
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, DbError> {
        if value.is_empty() {
            return Err(DbError::NullHandle("value"));
        }
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handle_fails_with_null_handle() {
        let v = Value::default();
        assert!(v.is_empty());
        assert!(v.is_null());
        assert!(matches!(v.get_i64(), Err(DbError::NullHandle("value"))));
    }

    #[test]
    fn typed_get_through_backend() -> Result<(), DbError> {
        let v = Value::from(SqlValue::Int(42));
        assert_eq!(v.get::<i64>()?, 42);
        assert_eq!(v.get::<String>()?, "42");
        assert_eq!(v.get::<Option<i32>>()?, Some(42));
        Ok(())
    }

    #[test]
    fn null_cell_maps_to_none() -> Result<(), DbError> {
        let v = Value::from(SqlValue::Null);
        assert!(!v.is_empty());
        assert_eq!(v.get::<Option<String>>()?, None);
        assert!(matches!(v.get::<String>(), Err(DbError::NullValue)));
        Ok(())
    }
}
