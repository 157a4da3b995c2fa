use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// `select_row`/`select_value` produced no rows.
    #[error("no rows found")]
    NotFound,

    /// A getter was called on a NULL cell.
    #[error("value is null")]
    NullValue,

    #[error("type error: {0}")]
    TypeError(String),

    /// The engine rejected a statement.
    #[error("SQL error: {message} (sql: {sql})")]
    Sql { sql: String, message: String },

    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Bad URL, unknown driver module or missing factory symbol.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("connection pool for {url} is exhausted")]
    PoolExhausted { url: String },

    #[error("usage error: {0}")]
    Usage(String),

    /// Operation on a default-constructed façade.
    #[error("{0} handle is empty")]
    NullHandle(&'static str),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl DbError {
    pub fn sql(sql: impl Into<String>, message: impl std::fmt::Display) -> Self {
        DbError::Sql {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn type_error(from: &str, to: &str) -> Self {
        DbError::TypeError(format!("cannot convert {from} to {to}"))
    }
}
