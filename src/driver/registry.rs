use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use tracing::debug;

use super::{ConnectionBackend, ConnectionManager};
use crate::connection::Connection;
use crate::error::DbError;
use crate::sync::lock;

/// Version of the driver interface; part of every module and symbol name.
pub const ABI_VERSION: u32 = 1;

static GLOBAL: LazyLock<Arc<DriverRegistry>> =
    LazyLock::new(|| Arc::new(DriverRegistry::with_builtin_drivers()));

/// Module name a driver for `scheme` is published under, e.g. `sqlportal1-sqlite`.
#[must_use]
pub fn module_name(scheme: &str) -> String {
    format!("sqlportal{ABI_VERSION}-{scheme}")
}

/// Symbol a driver module exports its [`ConnectionManager`] under,
/// e.g. `connection_manager1_sqlite`.
#[must_use]
pub fn symbol_name(scheme: &str) -> String {
    format!("connection_manager{ABI_VERSION}_{scheme}")
}

/// Split `scheme:rest` at the first `:`.
///
/// # Errors
/// Returns `DbError::Config` if there is no `:` or the scheme is empty.
pub fn split_url(url: &str) -> Result<(&str, &str), DbError> {
    match url.split_once(':') {
        Some((scheme, rest)) if !scheme.is_empty() => Ok((scheme, rest)),
        _ => Err(DbError::Config(format!(
            "invalid connection url '{url}': expected <scheme>:<driver specific part>"
        ))),
    }
}

/// A driver module: a named table of exported connection managers.
#[derive(Clone)]
pub struct DriverModule {
    name: String,
    symbols: HashMap<String, Arc<dyn ConnectionManager>>,
}

impl DriverModule {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    /// Export `manager` under `symbol`.
    #[must_use]
    pub fn export(
        mut self,
        symbol: impl Into<String>,
        manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        self.symbols.insert(symbol.into(), manager);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn symbol(&self, symbol: &str) -> Option<Arc<dyn ConnectionManager>> {
        self.symbols.get(symbol).cloned()
    }
}

impl fmt::Debug for DriverModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<&String> = self.symbols.keys().collect();
        symbols.sort();
        f.debug_struct("DriverModule")
            .field("name", &self.name)
            .field("symbols", &symbols)
            .finish()
    }
}

/// Resolves a URL scheme to the driver that serves it.
///
/// Driver modules are linked in and registered by name. On first use of a
/// scheme the registry looks up the module named by [`module_name`], resolves
/// [`symbol_name`] in it, and caches the resulting manager for later connects.
///
/// ```rust
/// use sql_portal::driver::DriverRegistry;
///
/// let registry = DriverRegistry::new();
/// let err = registry.connect("nosuchdb:whatever").unwrap_err();
/// assert!(err.to_string().contains("nosuchdb"));
/// ```
#[derive(Default)]
pub struct DriverRegistry {
    modules: Mutex<HashMap<String, DriverModule>>,
    loaded: Mutex<HashMap<String, Arc<dyn ConnectionManager>>>,
}

impl DriverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every driver compiled into this build.
    #[must_use]
    pub fn with_builtin_drivers() -> Self {
        let registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register("sqlite", crate::sqlite::SqliteManager::default());
        registry
    }

    /// The process-wide registry used by [`crate::connect`].
    #[must_use]
    pub fn global() -> Arc<DriverRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Add (or replace) a driver module.
    pub fn register_module(&self, module: DriverModule) {
        debug!(module = module.name(), "registering driver module");
        lock(&self.modules).insert(module.name.clone(), module);
        // a replaced module must be resolved again
        lock(&self.loaded).clear();
    }

    /// Register `manager` as the driver for `scheme` under the conventional
    /// module and symbol names.
    pub fn register<M>(&self, scheme: &str, manager: M)
    where
        M: ConnectionManager + 'static,
    {
        let module =
            DriverModule::new(module_name(scheme)).export(symbol_name(scheme), Arc::new(manager));
        self.register_module(module);
    }

    /// Resolve the connection manager for `scheme`, loading it on first use.
    ///
    /// # Errors
    /// Returns `DbError::Config` if no module serves `scheme` or the module
    /// lacks the expected symbol.
    pub fn manager(&self, scheme: &str) -> Result<Arc<dyn ConnectionManager>, DbError> {
        let mut loaded = lock(&self.loaded);
        if let Some(manager) = loaded.get(scheme) {
            return Ok(Arc::clone(manager));
        }

        let name = module_name(scheme);
        let symbol = symbol_name(scheme);
        let manager = {
            let modules = lock(&self.modules);
            let module = modules.get(&name).ok_or_else(|| {
                DbError::Config(format!(
                    "no driver for scheme '{scheme}': module {name} not found"
                ))
            })?;
            module.symbol(&symbol).ok_or_else(|| {
                DbError::Config(format!(
                    "driver module {name} for scheme '{scheme}' does not export {symbol}"
                ))
            })?
        };

        debug!(scheme, module = %name, "driver loaded");
        loaded.insert(scheme.to_string(), Arc::clone(&manager));
        Ok(manager)
    }

    /// Schemes resolved so far.
    #[must_use]
    pub fn loaded_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = lock(&self.loaded).keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Open a raw driver connection for `url`.
    ///
    /// # Errors
    /// Returns `DbError::Config` for a malformed URL or unknown scheme, or the
    /// driver's error if connecting fails.
    pub fn connect_backend(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn ConnectionBackend>, DbError> {
        let (scheme, rest) = split_url(url)?;
        let manager = self.manager(scheme)?;
        debug!(scheme, "connecting");
        manager.connect(rest, username, password)
    }

    /// Open an unpooled connection.
    ///
    /// # Errors
    /// See [`DriverRegistry::connect_backend`].
    pub fn connect(&self, url: &str) -> Result<Connection, DbError> {
        self.connect_with_credentials(url, "", "")
    }

    /// Open an unpooled connection with explicit credentials.
    ///
    /// # Errors
    /// See [`DriverRegistry::connect_backend`].
    pub fn connect_with_credentials(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Connection, DbError> {
        let backend = self.connect_backend(url, username, password)?;
        Ok(Connection::from_backend(backend))
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<String> = lock(&self.modules).keys().cloned().collect();
        modules.sort();
        f.debug_struct("DriverRegistry")
            .field("modules", &modules)
            .field("loaded", &self.loaded_schemes())
            .finish()
    }
}
