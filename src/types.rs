use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::blob::Blob;
use crate::driver::ValueBackend;
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A single database value, used both for bound parameters and for
/// materialized result cells.
///
/// ```rust
/// use sql_portal::SqlValue;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Blob(Blob),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Decimal(Decimal),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, used in conversion errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::UInt(_) => "unsigned",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::Decimal(_) => "decimal",
        }
    }

    fn text(&self, target: &str) -> Result<&str, DbError> {
        match self {
            SqlValue::Text(s) => Ok(s.trim()),
            SqlValue::Null => Err(DbError::NullValue),
            other => Err(DbError::type_error(other.kind(), target)),
        }
    }
}

impl ValueBackend for SqlValue {
    fn is_null(&self) -> bool {
        SqlValue::is_null(self)
    }

    fn get_bool(&self) -> Result<bool, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(i) => Ok(*i != 0),
            SqlValue::UInt(u) => Ok(*u != 0),
            SqlValue::Text(s) => match s.trim().chars().next() {
                Some('t' | 'T' | 'y' | 'Y' | '1') => Ok(true),
                Some('f' | 'F' | 'n' | 'N' | '0') => Ok(false),
                _ => Err(DbError::TypeError(format!("'{s}' is not a bool"))),
            },
            other => Err(DbError::type_error(other.kind(), "bool")),
        }
    }

    fn get_i64(&self) -> Result<i64, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Int(i) => Ok(*i),
            SqlValue::UInt(u) => i64::try_from(*u)
                .map_err(|_| DbError::TypeError(format!("{u} does not fit into i64"))),
            SqlValue::Bool(b) => Ok(i64::from(*b)),
            SqlValue::Float(f) => float_to_i64(*f),
            SqlValue::Decimal(d) => d
                .trunc()
                .to_i64()
                .ok_or_else(|| DbError::TypeError(format!("{d} does not fit into i64"))),
            SqlValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| DbError::TypeError(format!("'{s}' is not an integer"))),
            other => Err(DbError::type_error(other.kind(), "int")),
        }
    }

    fn get_u64(&self) -> Result<u64, DbError> {
        match self {
            SqlValue::UInt(u) => Ok(*u),
            SqlValue::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| DbError::TypeError(format!("'{s}' is not an unsigned integer"))),
            other => {
                let i = other.get_i64()?;
                u64::try_from(i).map_err(|_| DbError::TypeError(format!("{i} is negative")))
            }
        }
    }

    fn get_f64(&self) -> Result<f64, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(i) => Ok(*i as f64),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::UInt(u) => Ok(*u as f64),
            SqlValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            SqlValue::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| DbError::TypeError(format!("{d} does not fit into f64"))),
            SqlValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| DbError::TypeError(format!("'{s}' is not a number"))),
            other => Err(DbError::type_error(other.kind(), "float")),
        }
    }

    fn get_string(&self) -> Result<String, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Bool(b) => Ok(b.to_string()),
            SqlValue::Int(i) => Ok(i.to_string()),
            SqlValue::UInt(u) => Ok(u.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            SqlValue::Decimal(d) => Ok(d.to_string()),
            SqlValue::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
            SqlValue::Time(t) => Ok(t.format("%H:%M:%S%.f").to_string()),
            SqlValue::DateTime(dt) => Ok(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::Blob(b) => String::from_utf8(b.data().to_vec())
                .map_err(|_| DbError::type_error("binary blob", "string")),
        }
    }

    fn get_blob(&self) -> Result<Blob, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Blob(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(Blob::from_slice(s.as_bytes())),
            other => Err(DbError::type_error(other.kind(), "blob")),
        }
    }

    fn get_date(&self) -> Result<NaiveDate, DbError> {
        match self {
            SqlValue::Date(d) => Ok(*d),
            SqlValue::DateTime(dt) => Ok(dt.date()),
            other => {
                let s = other.text("date")?;
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                    .ok_or_else(|| DbError::TypeError(format!("'{s}' is not a date")))
            }
        }
    }

    fn get_time(&self) -> Result<NaiveTime, DbError> {
        match self {
            SqlValue::Time(t) => Ok(*t),
            SqlValue::DateTime(dt) => Ok(dt.time()),
            other => {
                let s = other.text("time")?;
                TIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
                    .or_else(|| parse_datetime(s).map(|dt| dt.time()))
                    .ok_or_else(|| DbError::TypeError(format!("'{s}' is not a time")))
            }
        }
    }

    fn get_datetime(&self) -> Result<NaiveDateTime, DbError> {
        match self {
            SqlValue::DateTime(dt) => Ok(*dt),
            SqlValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            other => {
                let s = other.text("datetime")?;
                parse_datetime(s)
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, DATE_FORMAT)
                            .ok()
                            .map(|d| d.and_time(NaiveTime::MIN))
                    })
                    .ok_or_else(|| DbError::TypeError(format!("'{s}' is not a datetime")))
            }
        }
    }

    fn get_decimal(&self) -> Result<Decimal, DbError> {
        match self {
            SqlValue::Null => Err(DbError::NullValue),
            SqlValue::Decimal(d) => Ok(*d),
            SqlValue::Int(i) => Ok(Decimal::from(*i)),
            SqlValue::UInt(u) => Ok(Decimal::from(*u)),
            SqlValue::Float(f) => Decimal::from_f64(*f)
                .ok_or_else(|| DbError::TypeError(format!("{f} is not a decimal"))),
            SqlValue::Text(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|_| DbError::TypeError(format!("'{s}' is not a decimal"))),
            other => Err(DbError::type_error(other.kind(), "decimal")),
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i64(f: f64) -> Result<i64, DbError> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(f.trunc() as i64)
    } else {
        Err(DbError::TypeError(format!("{f} does not fit into i64")))
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_sql_value! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
    String => Text,
    Blob => Blob,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    Decimal => Decimal,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<char> for SqlValue {
    fn from(v: char) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(Blob::from_slice(v))
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(Blob::from(v))
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_getters_fail_with_null_value() {
        let v = SqlValue::Null;
        assert!(matches!(v.get_i64(), Err(DbError::NullValue)));
        assert!(matches!(v.get_string(), Err(DbError::NullValue)));
        assert!(matches!(v.get_date(), Err(DbError::NullValue)));
        assert!(matches!(v.get_blob(), Err(DbError::NullValue)));
    }

    #[test]
    fn malformed_date_is_type_error() {
        let v = SqlValue::Text("2024-13-45".into());
        assert!(matches!(v.get_date(), Err(DbError::TypeError(_))));
        assert!(matches!(SqlValue::Float(1.5).get_date(), Err(DbError::TypeError(_))));
    }

    #[test]
    fn parses_temporal_text() -> Result<(), DbError> {
        let v = SqlValue::Text("2024-03-01 12:34:56.5".into());
        assert_eq!(v.get_date()?, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(
            v.get_time()?,
            NaiveTime::from_hms_milli_opt(12, 34, 56, 500).unwrap()
        );
        let t = SqlValue::Text("2024-03-01T08:00:00".into()).get_datetime()?;
        assert_eq!(t.to_string(), "2024-03-01 08:00:00");
        let d = SqlValue::Text("2024-03-01".into()).get_datetime()?;
        assert_eq!(d.to_string(), "2024-03-01 00:00:00");
        Ok(())
    }

    #[test]
    fn bool_from_text_and_int() -> Result<(), DbError> {
        assert!(SqlValue::Text("true".into()).get_bool()?);
        assert!(SqlValue::Text("Y".into()).get_bool()?);
        assert!(!SqlValue::Text("0".into()).get_bool()?);
        assert!(SqlValue::Int(7).get_bool()?);
        assert!(matches!(
            SqlValue::Text("maybe".into()).get_bool(),
            Err(DbError::TypeError(_))
        ));
        Ok(())
    }

    #[test]
    fn integer_narrowing_is_checked() {
        assert!(matches!(SqlValue::Int(-1).get_u64(), Err(DbError::TypeError(_))));
        assert!(matches!(
            SqlValue::UInt(u64::MAX).get_i64(),
            Err(DbError::TypeError(_))
        ));
        assert!(matches!(SqlValue::Int(1 << 40).get_i32(), Err(DbError::TypeError(_))));
        assert!(matches!(SqlValue::Float(f64::NAN).get_i64(), Err(DbError::TypeError(_))));
    }

    #[test]
    fn numbers_render_as_strings() -> Result<(), DbError> {
        assert_eq!(SqlValue::Int(42).get_string()?, "42");
        assert_eq!(SqlValue::from("hi").get_string()?, "hi");
        assert_eq!(SqlValue::Text(" 17 ".into()).get_i64()?, 17);
        assert_eq!(SqlValue::Text("1.25".into()).get_decimal()?.to_string(), "1.25");
        Ok(())
    }

    #[test]
    fn option_maps_to_null() {
        assert!(SqlValue::from(None::<i32>).is_null());
        assert_eq!(SqlValue::from(Some(3_i32)), SqlValue::Int(3));
    }
}
