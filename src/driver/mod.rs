//! Interfaces a backend driver implements.
//!
//! Connection, statement, cursor, result, row and value are separate traits so
//! a driver only implements what its engine model supports naturally: a
//! row-at-a-time engine streams through [`CursorBackend`], an engine that
//! materializes whole results can hand back [`MemResult`](crate::results::MemResult)
//! and reuse the default `select_row`/`select_value`.
//!
//! The façade types in [`crate::results`], [`Statement`] and
//! [`Connection`](crate::Connection) wrap these behind shared ownership.

pub mod registry;

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::blob::Blob;
use crate::error::DbError;
use crate::results::{ResultSet, Row, Value};
use crate::statement::Statement;
use crate::types::SqlValue;

pub use registry::{ABI_VERSION, DriverModule, DriverRegistry, module_name, split_url, symbol_name};

/// Shared, lockable statement implementation.
pub type SharedStatement = Arc<Mutex<dyn StatementBackend>>;

/// Factory a driver module exports: opens connections for the part of the URL
/// after `scheme:`.
pub trait ConnectionManager: Send + Sync {
    /// Open a connection.
    ///
    /// # Errors
    /// Returns `DbError` if the engine refuses the connection.
    fn connect(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn ConnectionBackend>, DbError>;
}

/// A live connection to one engine.
pub trait ConnectionBackend: Send {
    fn begin_transaction(&mut self) -> Result<(), DbError>;

    fn commit_transaction(&mut self) -> Result<(), DbError>;

    fn rollback_transaction(&mut self) -> Result<(), DbError>;

    /// Run a statement without result rows, returning the affected row count.
    fn execute(&mut self, sql: &str) -> Result<u64, DbError>;

    fn select(&mut self, sql: &str) -> Result<ResultSet, DbError>;

    /// First row of `sql`; further rows are discarded.
    fn select_row(&mut self, sql: &str) -> Result<Row, DbError> {
        self.select(sql)?.first_row()
    }

    fn select_value(&mut self, sql: &str) -> Result<Value, DbError> {
        self.select_row(sql)?.value(0)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, DbError>;

    /// Prepare `sql` with pagination. `limit` and `offset` name host
    /// variables; an empty `offset` means no offset clause. The default
    /// appends `LIMIT`/`OFFSET`, engines with other syntax override it.
    fn prepare_with_limit(
        &mut self,
        sql: &str,
        limit: &str,
        offset: &str,
    ) -> Result<Statement, DbError> {
        let mut query = format!("{sql} LIMIT :{limit}");
        if !offset.is_empty() {
            query.push_str(" OFFSET :");
            query.push_str(offset);
        }
        self.prepare(&query)
    }

    fn ping(&mut self) -> bool;

    /// Last generated key. `name` is a sequence name on engines that use them.
    fn last_insert_id(&mut self, name: &str) -> Result<i64, DbError>;

    /// Lock `table` for the rest of the current transaction.
    fn lock_table(&mut self, table: &str, exclusive: bool) -> Result<(), DbError>;

    /// True while the engine has a transaction open, including one started
    /// with plain SQL. A pool rolls such a connection back before reuse.
    /// Engines that cannot tell report `false`; transactions begun through
    /// [`begin_transaction`](ConnectionBackend::begin_transaction) are
    /// tracked by the [`Connection`](crate::Connection) regardless.
    fn in_transaction(&mut self) -> bool {
        false
    }
}

/// A prepared statement plus its bound host variables.
pub trait StatementBackend: Send {
    /// Forget all bound values.
    fn clear(&mut self);

    /// Bind `value` to host variable `name`.
    fn set_value(&mut self, name: &str, value: SqlValue) -> Result<(), DbError>;

    fn set_null(&mut self, name: &str) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Null)
    }

    fn set_bool(&mut self, name: &str, value: bool) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Bool(value))
    }

    fn set_i32(&mut self, name: &str, value: i32) -> Result<(), DbError> {
        self.set_value(name, SqlValue::from(value))
    }

    fn set_i64(&mut self, name: &str, value: i64) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Int(value))
    }

    fn set_u32(&mut self, name: &str, value: u32) -> Result<(), DbError> {
        self.set_value(name, SqlValue::from(value))
    }

    fn set_u64(&mut self, name: &str, value: u64) -> Result<(), DbError> {
        self.set_value(name, SqlValue::UInt(value))
    }

    fn set_f32(&mut self, name: &str, value: f32) -> Result<(), DbError> {
        self.set_value(name, SqlValue::from(value))
    }

    fn set_f64(&mut self, name: &str, value: f64) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Float(value))
    }

    fn set_char(&mut self, name: &str, value: char) -> Result<(), DbError> {
        self.set_value(name, SqlValue::from(value))
    }

    fn set_string(&mut self, name: &str, value: &str) -> Result<(), DbError> {
        self.set_value(name, SqlValue::from(value))
    }

    fn set_blob(&mut self, name: &str, value: &Blob) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Blob(value.clone()))
    }

    fn set_date(&mut self, name: &str, value: NaiveDate) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Date(value))
    }

    fn set_time(&mut self, name: &str, value: NaiveTime) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Time(value))
    }

    fn set_datetime(&mut self, name: &str, value: NaiveDateTime) -> Result<(), DbError> {
        self.set_value(name, SqlValue::DateTime(value))
    }

    fn set_decimal(&mut self, name: &str, value: Decimal) -> Result<(), DbError> {
        self.set_value(name, SqlValue::Decimal(value))
    }

    fn execute(&mut self) -> Result<u64, DbError>;

    fn select(&mut self) -> Result<ResultSet, DbError>;

    fn select_row(&mut self) -> Result<Row, DbError> {
        self.select()?.first_row()
    }

    fn select_value(&mut self) -> Result<Value, DbError> {
        self.select_row()?.value(0)
    }

    /// Start a lazy fetch. `fetch_size` is a hint for drivers that fetch in
    /// batches.
    fn create_cursor(&mut self, fetch_size: u32) -> Result<Box<dyn CursorBackend>, DbError>;

    /// Allow up to `n` executions to be deferred and sent as a batch.
    /// Returns the limit actually in effect; drivers without batching keep 0.
    fn max_num_delay(&mut self, _n: u32) -> u32 {
        0
    }

    fn num_delayed(&self) -> u32 {
        0
    }

    /// Send deferred executions, returning the number flushed.
    fn flush(&mut self) -> Result<u32, DbError> {
        Ok(0)
    }
}

/// Forward-only row source.
pub trait CursorBackend: Send {
    /// Next row, or a null [`Row`] once the data is exhausted.
    fn fetch(&mut self) -> Result<Row, DbError>;
}

/// A materialized result.
pub trait ResultBackend: Send + Sync + fmt::Debug {
    fn size(&self) -> usize;

    fn field_count(&self) -> usize;

    fn get_row(&self, index: usize) -> Result<Row, DbError>;
}

/// One result row.
pub trait RowBackend: Send + Sync + fmt::Debug {
    fn size(&self) -> usize;

    fn get_value_by_number(&self, index: usize) -> Result<Value, DbError>;

    fn get_column_name(&self, index: usize) -> Result<&str, DbError>;

    /// Case-sensitive lookup; `FieldNotFound` when no column matches.
    fn get_value_by_name(&self, name: &str) -> Result<Value, DbError> {
        for index in 0..self.size() {
            if self.get_column_name(index)? == name {
                return self.get_value_by_number(index);
            }
        }
        Err(DbError::FieldNotFound(name.to_string()))
    }
}

/// One cell. Getters fail with `NullValue` on NULL and `TypeError` when the
/// value cannot be converted.
///
/// Only the core getters are required; the rest narrow them or parse
/// [`get_string`](ValueBackend::get_string).
pub trait ValueBackend: Send + Sync + fmt::Debug {
    fn is_null(&self) -> bool;

    fn get_bool(&self) -> Result<bool, DbError>;

    fn get_i64(&self) -> Result<i64, DbError>;

    fn get_f64(&self) -> Result<f64, DbError>;

    fn get_string(&self) -> Result<String, DbError>;

    fn get_blob(&self) -> Result<Blob, DbError>;

    fn get_u64(&self) -> Result<u64, DbError> {
        let v = self.get_i64()?;
        u64::try_from(v).map_err(|_| DbError::TypeError(format!("{v} is negative")))
    }

    fn get_i16(&self) -> Result<i16, DbError> {
        narrow(self.get_i64()?)
    }

    fn get_i32(&self) -> Result<i32, DbError> {
        narrow(self.get_i64()?)
    }

    fn get_u32(&self) -> Result<u32, DbError> {
        narrow(self.get_u64()?)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn get_f32(&self) -> Result<f32, DbError> {
        Ok(self.get_f64()? as f32)
    }

    fn get_char(&self) -> Result<char, DbError> {
        self.get_string()?
            .chars()
            .next()
            .ok_or_else(|| DbError::TypeError("empty string is not a char".into()))
    }

    fn get_date(&self) -> Result<NaiveDate, DbError> {
        SqlValue::Text(self.get_string()?).get_date()
    }

    fn get_time(&self) -> Result<NaiveTime, DbError> {
        SqlValue::Text(self.get_string()?).get_time()
    }

    fn get_datetime(&self) -> Result<NaiveDateTime, DbError> {
        SqlValue::Text(self.get_string()?).get_datetime()
    }

    fn get_decimal(&self) -> Result<Decimal, DbError> {
        SqlValue::Text(self.get_string()?).get_decimal()
    }
}

fn narrow<S, T>(value: S) -> Result<T, DbError>
where
    S: Copy + fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| {
        DbError::TypeError(format!(
            "{value} does not fit into {}",
            std::any::type_name::<T>()
        ))
    })
}
