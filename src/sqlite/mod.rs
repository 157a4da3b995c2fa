// SQLite driver built on rusqlite.
//
// - config: connect options and the `ConnectionManager` registered for `sqlite:`
// - connection: connection backend (transactions, one-shot SQL, prepare)
// - statement: prepared statement backend with named host variables
// - params: conversion of bound values into SQLite values
// - query: result extraction into in-memory results
// - worker: thread that owns the rusqlite connection and steps open cursors

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod statement;
mod worker;

pub use config::{SqliteManager, SqliteOptions};
pub use connection::SqliteConnection;
pub use statement::{SqliteCursor, SqliteStatement};
