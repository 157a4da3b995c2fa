use std::collections::HashMap;

use rusqlite::types::Value;

use crate::translation::RewrittenSql;
use crate::types::SqlValue;

/// Convert a bound value into the SQLite storage class it is written as.
///
/// SQLite has no temporal or decimal types; those are stored as text in the
/// same formats the value getters parse back.
#[must_use]
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(u.to_string()),
        },
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.data().to_vec()),
        SqlValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => Value::Text(t.format("%H:%M:%S%.f").to_string()),
        SqlValue::DateTime(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Decimal(d) => Value::Text(d.to_string()),
    }
}

/// Positional parameters for `sql`, in placeholder order. Host variables
/// that were never bound are NULL.
#[must_use]
pub fn positional_params(sql: &RewrittenSql, bound: &HashMap<String, SqlValue>) -> Vec<Value> {
    sql.params
        .iter()
        .map(|name| bound.get(name).map_or(Value::Null, to_sqlite_value))
        .collect()
}
