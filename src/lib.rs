//! Portable database client.
//!
//! Application code talks to one API ([`Connection`], [`Statement`],
//! [`ResultSet`], [`Row`], [`Value`], [`Transaction`]) while a driver chosen by
//! the URL scheme does the engine-specific work. Connections can be pooled per
//! URL, prepared statements cached per connection, and SQL assembled from
//! templates with [`SqlBuilder`].
//!
//! ```rust
//! use sql_portal::prelude::*;
//!
//! let conn = sql_portal::connect("sqlite::memory:")?;
//! conn.execute("create table t(a integer, b text)")?;
//!
//! let insert = conn.prepare("insert into t(a, b) values(:a, :b)")?;
//! insert.bind("a", 42)?.bind("b", "hi")?.execute()?;
//!
//! let row = conn.select_row("select b from t where a = 42")?;
//! assert_eq!(row.value(0)?.get_string()?, "hi");
//! # Ok::<(), DbError>(())
//! ```

pub mod blob;
pub mod connection;
pub mod driver;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod query_builder;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod statement;
pub mod statement_cache;
mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transaction;
pub mod translation;
pub mod types;

use std::sync::Arc;

pub use blob::Blob;
pub use connection::Connection;
pub use driver::{ConnectionBackend, ConnectionManager, DriverModule, DriverRegistry};
pub use error::DbError;
pub use pool::{ConnectionPool, ConnectionPools, ExhaustedPolicy, PoolOptions};
pub use query_builder::SqlBuilder;
pub use results::{Cursor, FromValue, MaterializedCursor, MemResult, MemRow, ResultSet, Row, Value};
pub use statement::Statement;
pub use statement_cache::CachingConnection;
pub use transaction::Transaction;
pub use translation::{HostVarHandler, PlaceholderStyle, RewrittenSql, StmtParser, rewrite_host_vars};
pub use types::SqlValue;

/// Open an unpooled connection to `url` (`<scheme>:<driver specific part>`).
///
/// # Errors
/// `DbError::Config` for a malformed URL or a scheme no driver serves; the
/// driver's error if it cannot connect.
pub fn connect(url: &str) -> Result<Connection, DbError> {
    DriverRegistry::global().connect(url)
}

/// Like [`connect`], passing credentials to the driver.
///
/// # Errors
/// See [`connect`].
pub fn connect_with_credentials(
    url: &str,
    username: &str,
    password: &str,
) -> Result<Connection, DbError> {
    DriverRegistry::global().connect_with_credentials(url, username, password)
}

/// Check out a connection from the process-wide pool for `url`.
///
/// # Errors
/// See [`ConnectionPool::connect`].
pub fn connect_pooled(url: &str) -> Result<Connection, DbError> {
    ConnectionPools::global().connect(url)
}

/// Open an unpooled connection with a prepared-statement cache.
///
/// # Errors
/// See [`connect`].
pub fn connect_cached(url: &str) -> Result<CachingConnection, DbError> {
    connect(url).map(CachingConnection::new)
}

/// Close idle pooled connections down to `keep` per URL.
pub fn drop_pooled(keep: usize) {
    ConnectionPools::global().drop_idle(keep);
}

/// Close idle pooled connections to `url` down to `keep`.
pub fn drop_pooled_url(url: &str, keep: usize) {
    ConnectionPools::global().drop_idle_url(url, keep);
}

/// Bound the process-wide pools; 0 means unbounded. Pools with connections
/// checked out keep their current bound.
pub fn set_max_pool_size(max_size: usize) {
    ConnectionPools::global().set_max_size(max_size);
}

#[must_use]
pub fn max_pool_size() -> usize {
    ConnectionPools::global().max_size()
}

/// Make `manager` the driver for `scheme` in the process-wide registry.
pub fn register_driver<M>(scheme: &str, manager: M)
where
    M: ConnectionManager + 'static,
{
    DriverRegistry::global().register(scheme, manager);
}

/// The process-wide driver registry.
#[must_use]
pub fn driver_registry() -> Arc<DriverRegistry> {
    DriverRegistry::global()
}
