//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need.

pub use crate::blob::Blob;
pub use crate::connection::Connection;
pub use crate::error::DbError;
pub use crate::pool::{ConnectionPool, ConnectionPools, ExhaustedPolicy, PoolOptions};
pub use crate::query_builder::SqlBuilder;
pub use crate::results::{Cursor, FromValue, ResultSet, Row, Value};
pub use crate::statement::Statement;
pub use crate::statement_cache::CachingConnection;
pub use crate::transaction::Transaction;
pub use crate::types::SqlValue;

pub use crate::{connect, connect_cached, connect_pooled, connect_with_credentials};
