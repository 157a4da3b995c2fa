use rusqlite::types::Value;
use rusqlite::{Statement, params_from_iter};

use crate::blob::Blob;
use crate::error::DbError;
use crate::results::{MemResult, ResultSet};
use crate::types::SqlValue;

/// Extract column `idx` of a SQLite row.
///
/// # Errors
/// Returns `DbError` if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<SqlValue, DbError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(Blob::from(b)),
    })
}

/// Run `stmt` with `params` and materialize every row.
///
/// # Errors
/// Returns `DbError::Sql` if execution or row extraction fails.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &[Value],
    sql: &str,
) -> Result<ResultSet, DbError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let column_count = column_names.len();
    let mut result = MemResult::with_capacity(column_names, 10);

    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| DbError::sql(sql, e))?;
    while let Some(row) = rows.next().map_err(|e| DbError::sql(sql, e))? {
        let values = (0..column_count)
            .map(|i| sqlite_extract_value(row, i))
            .collect::<Result<Vec<_>, _>>()?;
        result.push_row(values);
    }

    Ok(result.into_result_set())
}
