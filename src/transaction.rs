use tracing::warn;

use crate::connection::Connection;
use crate::error::DbError;

/// Scoped transaction on one [`Connection`].
///
/// Dropping an active transaction rolls it back; a failing rollback at that
/// point is logged and otherwise ignored.
///
/// ```rust
/// let conn = sql_portal::connect("sqlite::memory:")?;
/// conn.execute("create table t(a integer)")?;
/// {
///     let _tx = conn.transaction()?;
///     conn.execute("insert into t values (1)")?;
/// }
/// assert_eq!(conn.select_value("select count(*) from t")?.get_i64()?, 0);
/// # Ok::<(), sql_portal::DbError>(())
/// ```
#[derive(Debug)]
pub struct Transaction {
    conn: Connection,
    active: bool,
}

impl Transaction {
    /// Bind to `conn` without starting a transaction.
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            active: false,
        }
    }

    /// Bind to `conn` and begin right away.
    ///
    /// # Errors
    /// Returns the connection's error if `begin` fails.
    pub fn begin_on(conn: Connection) -> Result<Self, DbError> {
        let mut tx = Self::new(conn);
        tx.begin()?;
        Ok(tx)
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a transaction. An active one is rolled back first.
    pub fn begin(&mut self) -> Result<(), DbError> {
        if self.active {
            warn!("begin called on an active transaction, rolling it back");
            self.rollback()?;
        }
        self.conn.begin_transaction()?;
        self.active = true;
        Ok(())
    }

    /// Commit; does nothing when inactive.
    pub fn commit(&mut self) -> Result<(), DbError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.conn.commit_transaction()
    }

    /// Roll back; does nothing when inactive.
    pub fn rollback(&mut self) -> Result<(), DbError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.conn.rollback_transaction()
    }

    /// Lock `table` until commit or rollback.
    pub fn lock_table(&self, table: &str, exclusive: bool) -> Result<(), DbError> {
        self.conn.lock_table(table, exclusive)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Err(err) = self.rollback() {
            warn!(error = %err, "rollback of dropped transaction failed");
        }
    }
}
