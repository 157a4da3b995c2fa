use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use tracing::debug;

use super::{ConnectionPool, PoolOptions};
use crate::connection::Connection;
use crate::driver::DriverRegistry;
use crate::error::DbError;
use crate::sync::lock;

static GLOBAL: LazyLock<ConnectionPools> =
    LazyLock::new(|| ConnectionPools::new(DriverRegistry::global()));

/// One [`ConnectionPool`] per URL, created on first use.
///
/// All pools share the registry's default [`PoolOptions`]; the pool map and
/// the defaults sit behind one lock.
pub struct ConnectionPools {
    registry: Arc<DriverRegistry>,
    state: Mutex<PoolsState>,
}

struct PoolsState {
    pools: HashMap<String, ConnectionPool>,
    options: PoolOptions,
}

impl ConnectionPools {
    #[must_use]
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self::with_options(registry, PoolOptions::default())
    }

    #[must_use]
    pub fn with_options(registry: Arc<DriverRegistry>, options: PoolOptions) -> Self {
        Self {
            registry,
            state: Mutex::new(PoolsState {
                pools: HashMap::new(),
                options,
            }),
        }
    }

    /// The process-wide pools behind [`crate::connect_pooled`], using
    /// [`DriverRegistry::global`].
    #[must_use]
    pub fn global() -> &'static ConnectionPools {
        &GLOBAL
    }

    /// The pool for `url`, created with the current default options if needed.
    #[must_use]
    pub fn pool(&self, url: &str) -> ConnectionPool {
        let mut state = lock(&self.state);
        if let Some(pool) = state.pools.get(url) {
            return pool.clone();
        }
        let pool = ConnectionPool::new(url, Arc::clone(&self.registry), state.options.clone());
        state.pools.insert(url.to_string(), pool.clone());
        pool
    }

    /// Check out a connection to `url`.
    ///
    /// # Errors
    /// See [`ConnectionPool::connect`].
    pub fn connect(&self, url: &str) -> Result<Connection, DbError> {
        // blocking happens on the per-URL pool, not on this registry
        self.pool(url).connect()
    }

    /// Close idle connections of every pool down to `keep` each.
    pub fn drop_idle(&self, keep: usize) {
        for pool in self.pools() {
            pool.drop_idle(keep);
        }
    }

    /// Close idle connections of the pool for `url` down to `keep`.
    pub fn drop_idle_url(&self, url: &str, keep: usize) {
        let pool = lock(&self.state).pools.get(url).cloned();
        if let Some(pool) = pool {
            pool.drop_idle(keep);
        }
    }

    /// Set the bound for new pools and for every existing pool with no
    /// checked-out connections. Busy pools keep their old bound.
    pub fn set_max_size(&self, max_size: usize) {
        let mut state = lock(&self.state);
        state.options.max_size = max_size;
        for pool in state.pools.values() {
            if !pool.set_max_size(max_size) {
                debug!(url = pool.url(), max_size, "pool busy, keeping its max size");
            }
        }
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        lock(&self.state).options.max_size
    }

    /// Defaults applied to pools created from now on.
    pub fn set_options(&self, options: PoolOptions) {
        lock(&self.state).options = options;
    }

    #[must_use]
    pub fn options(&self) -> PoolOptions {
        lock(&self.state).options.clone()
    }

    #[must_use]
    pub fn pool_count(&self) -> usize {
        lock(&self.state).pools.len()
    }

    fn pools(&self) -> Vec<ConnectionPool> {
        lock(&self.state).pools.values().cloned().collect()
    }
}

impl fmt::Debug for ConnectionPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut urls: Vec<String> = lock(&self.state).pools.keys().cloned().collect();
        urls.sort();
        f.debug_struct("ConnectionPools")
            .field("urls", &urls)
            .field("options", &self.options())
            .finish()
    }
}
