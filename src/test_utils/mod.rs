/// In-process mock driver with call counters, for tests and benchmarks.
pub mod mock;

use std::sync::Arc;

use crate::driver::DriverRegistry;

pub use mock::{MockConnection, MockCursor, MockManager, MockStats, MockStatement};

/// A registry serving `mock:` URLs through `manager`, with no other drivers.
#[must_use]
pub fn mock_registry(manager: &MockManager) -> Arc<DriverRegistry> {
    let registry = DriverRegistry::new();
    registry.register("mock", manager.clone());
    Arc::new(registry)
}
