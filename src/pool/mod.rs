//! Connection pooling.
//!
//! A [`ConnectionPool`] keeps the live connections for one URL. Checked-out
//! connections are ordinary [`Connection`] handles; when the last clone of one
//! is dropped the driver connection goes back to the pool's idle list instead
//! of being closed. [`ConnectionPools`] keys one pool per URL.

pub mod options;
pub mod registry;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::driver::{ConnectionBackend, DriverRegistry};
use crate::error::DbError;
use crate::sync::lock;

pub use options::{ExhaustedPolicy, PoolOptions};
pub use registry::ConnectionPools;

type Factory = dyn Fn() -> Result<Box<dyn ConnectionBackend>, DbError> + Send + Sync;

pub(crate) struct PoolShared {
    url: String,
    factory: Box<Factory>,
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    /// Oldest first.
    idle: VecDeque<Box<dyn ConnectionBackend>>,
    /// Idle plus checked out.
    total: usize,
    options: PoolOptions,
}

impl PoolState {
    fn in_use(&self) -> usize {
        self.total - self.idle.len()
    }

    fn has_room(&self) -> bool {
        self.options.max_size == 0 || self.total < self.options.max_size
    }
}

impl PoolShared {
    /// Take back a connection whose last handle was dropped. An open
    /// transaction is rolled back first; a connection that cannot be rolled
    /// back is closed instead of pooled.
    pub(crate) fn release(&self, mut backend: Box<dyn ConnectionBackend>, in_transaction: bool) {
        if in_transaction || backend.in_transaction() {
            if let Err(err) = backend.rollback_transaction() {
                warn!(url = %self.url, error = %err, "rollback on pool return failed, closing connection");
                drop(backend);
                self.forget_one();
                return;
            }
            debug!(url = %self.url, "rolled back transaction left open on pooled connection");
        }
        let mut state = lock(&self.state);
        state.idle.push_back(backend);
        debug!(url = %self.url, idle = state.idle.len(), "connection returned to pool");
        drop(state);
        self.available.notify_one();
    }

    fn forget_one(&self) {
        lock(&self.state).total -= 1;
        self.available.notify_one();
    }
}

/// Pool of connections to one URL.
///
/// Cloning is cheap; clones manage the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// A pool that opens connections for `url` through `registry`.
    pub fn new(url: impl Into<String>, registry: Arc<DriverRegistry>, options: PoolOptions) -> Self {
        let url = url.into();
        let target = url.clone();
        Self::with_factory(
            url,
            move || registry.connect_backend(&target, "", ""),
            options,
        )
    }

    /// A pool that opens connections with `factory`.
    pub fn with_factory<F>(url: impl Into<String>, factory: F, options: PoolOptions) -> Self
    where
        F: Fn() -> Result<Box<dyn ConnectionBackend>, DbError> + Send + Sync + 'static,
    {
        let url = url.into();
        debug!(url = %url, max_size = options.max_size, "creating connection pool");
        Self {
            shared: Arc::new(PoolShared {
                url,
                factory: Box::new(factory),
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    options,
                }),
                available: Condvar::new(),
            }),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        lock(&self.shared.state)
    }

    /// Check out a connection.
    ///
    /// Reuses the most recently released idle connection, opens a new one
    /// while under `max_size`, and otherwise follows the pool's
    /// [`ExhaustedPolicy`].
    ///
    /// # Errors
    /// `DbError::PoolExhausted` for a full pool under `FailFast` or after the
    /// acquire timeout; the driver's error if opening a connection fails.
    pub fn connect(&self) -> Result<Connection, DbError> {
        let shared = &self.shared;
        let mut state = self.state();
        let deadline = state.options.timeout().map(|t| Instant::now() + t);

        loop {
            if let Some(mut backend) = state.idle.pop_back() {
                let test = state.options.test_on_checkout;
                drop(state);
                if test && !backend.ping() {
                    debug!(url = %shared.url, "discarding dead pooled connection");
                    drop(backend);
                    shared.forget_one();
                    state = self.state();
                    continue;
                }
                debug!(url = %shared.url, "reusing pooled connection");
                return Ok(Connection::pooled(backend, Arc::downgrade(shared)));
            }

            if state.has_room() {
                state.total += 1;
                drop(state);
                return match (shared.factory)() {
                    Ok(backend) => {
                        debug!(url = %shared.url, "opened pooled connection");
                        Ok(Connection::pooled(backend, Arc::downgrade(shared)))
                    }
                    Err(err) => {
                        shared.forget_one();
                        Err(err)
                    }
                };
            }

            let exhausted = || DbError::PoolExhausted {
                url: shared.url.clone(),
            };
            match (state.options.when_exhausted, deadline) {
                (ExhaustedPolicy::FailFast, _) => return Err(exhausted()),
                (ExhaustedPolicy::Block, None) => {
                    debug!(url = %shared.url, "pool exhausted, waiting");
                    state = shared
                        .available
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                (ExhaustedPolicy::Block, Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(exhausted());
                    }
                    debug!(url = %shared.url, "pool exhausted, waiting");
                    state = shared
                        .available
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Close idle connections until at most `keep` remain idle; the oldest
    /// go first. Checked-out connections are never touched.
    pub fn drop_idle(&self, keep: usize) {
        let closed: Vec<Box<dyn ConnectionBackend>> = {
            let mut state = self.state();
            let surplus = state.idle.len().saturating_sub(keep);
            let closed: Vec<_> = state.idle.drain(..surplus).collect();
            state.total -= closed.len();
            closed
        };
        if !closed.is_empty() {
            debug!(url = %self.shared.url, closed = closed.len(), "dropped idle connections");
            self.shared.available.notify_all();
        }
    }

    /// Live connections, idle and checked out.
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.state().total
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.state().idle.len()
    }

    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.state().in_use()
    }

    /// 0 means unbounded.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.state().options.max_size
    }

    /// Change the bound. Only a pool with no checked-out connections can be
    /// resized; returns whether the new size took effect. Idle connections
    /// beyond the new bound are closed.
    pub fn set_max_size(&self, max_size: usize) -> bool {
        let closed: Vec<Box<dyn ConnectionBackend>> = {
            let mut state = self.state();
            if state.in_use() > 0 {
                debug!(url = %self.shared.url, "pool in use, max size unchanged");
                return false;
            }
            state.options.max_size = max_size;
            let surplus = if max_size == 0 {
                0
            } else {
                state.idle.len().saturating_sub(max_size)
            };
            let closed: Vec<_> = state.idle.drain(..surplus).collect();
            state.total -= closed.len();
            closed
        };
        drop(closed);
        self.shared.available.notify_all();
        true
    }

    #[must_use]
    pub fn options(&self) -> PoolOptions {
        self.state().options.clone()
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ConnectionPool")
            .field("url", &self.shared.url)
            .field("total", &state.total)
            .field("idle", &state.idle.len())
            .field("options", &state.options)
            .finish()
    }
}
