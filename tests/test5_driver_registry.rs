use std::sync::Arc;

use sql_portal::driver::{module_name, symbol_name};
use sql_portal::test_utils::MockManager;
use sql_portal::{DbError, DriverModule, DriverRegistry};

#[test]
fn unknown_scheme_is_a_config_error() {
    let registry = DriverRegistry::new();
    match registry.connect("oracle:scott/tiger") {
        Err(DbError::Config(msg)) => assert!(msg.contains("oracle")),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn url_without_scheme_is_rejected() {
    let registry = DriverRegistry::new();
    assert!(matches!(
        registry.connect("no-scheme-here"),
        Err(DbError::Config(_))
    ));
}

#[test]
fn module_without_factory_symbol_is_a_config_error() {
    let registry = DriverRegistry::new();
    registry.register_module(
        DriverModule::new(module_name("odbc")).export("wrong_symbol", Arc::new(MockManager::new())),
    );
    match registry.connect("odbc:DSN=x") {
        Err(DbError::Config(msg)) => {
            assert!(msg.contains("odbc"));
            assert!(msg.contains(&symbol_name("odbc")));
        }
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn explicitly_named_module_is_resolved() -> Result<(), DbError> {
    let manager = MockManager::new();
    let registry = DriverRegistry::new();
    registry.register_module(
        DriverModule::new("sqlportal1-postgresql")
            .export("connection_manager1_postgresql", Arc::new(manager.clone())),
    );

    let conn = registry.connect("postgresql:host=localhost dbname=x")?;
    assert!(conn.ping());
    assert_eq!(manager.stats().connects(), 1);
    Ok(())
}

#[test]
fn loaded_drivers_are_cached_per_scheme() -> Result<(), DbError> {
    let manager = MockManager::new();
    let registry = DriverRegistry::new();
    registry.register("mock", manager.clone());
    assert!(registry.loaded_schemes().is_empty());

    let first = registry.manager("mock")?;
    let second = registry.manager("mock")?;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.loaded_schemes(), vec!["mock".to_string()]);

    registry.connect("mock:a")?;
    registry.connect_with_credentials("mock:b", "user", "secret")?;
    assert_eq!(manager.stats().connects(), 2);
    Ok(())
}

#[test]
fn driver_failure_is_passed_through() {
    let manager = MockManager::new();
    manager.set_fail_connect(true);
    let registry = DriverRegistry::new();
    registry.register("mock", manager);
    assert!(matches!(
        registry.connect("mock:down"),
        Err(DbError::ConnectionError(_))
    ));
}

#[cfg(feature = "sqlite")]
#[test]
fn global_registry_serves_sqlite() -> Result<(), DbError> {
    let conn = sql_portal::connect("sqlite::memory:")?;
    assert_eq!(conn.select_value("select 40 + 2")?.get_i64()?, 42);
    assert!(
        sql_portal::driver_registry()
            .loaded_schemes()
            .contains(&"sqlite".to_string())
    );
    Ok(())
}
