use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// What a pool at capacity does when another connection is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Wait until a connection is released (or the acquire timeout passes).
    #[default]
    Block,
    /// Fail with `DbError::PoolExhausted` right away.
    FailFast,
}

/// Pool sizing and checkout behavior.
///
/// Every field has a default, so a config file only names what it changes:
///
/// ```rust
/// use sql_portal::{ExhaustedPolicy, PoolOptions};
///
/// let opts = PoolOptions::from_json(r#"{ "max_size": 4, "when_exhausted": "fail_fast" }"#)?;
/// assert_eq!(opts.max_size, 4);
/// assert_eq!(opts.when_exhausted, ExhaustedPolicy::FailFast);
/// assert!(!opts.test_on_checkout);
/// # Ok::<(), sql_portal::DbError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Upper bound on live connections; 0 means unbounded.
    pub max_size: usize,
    pub when_exhausted: ExhaustedPolicy,
    /// Give up blocking after this many milliseconds; `None` waits forever.
    pub acquire_timeout_ms: Option<u64>,
    /// Ping idle connections before handing them out and replace dead ones.
    pub test_on_checkout: bool,
}

impl PoolOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON.
    ///
    /// # Errors
    /// Returns `DbError::Config` when the document does not describe pool options.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        serde_json::from_str(json)
            .map_err(|e| DbError::Config(format!("invalid pool options: {e}")))
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn when_exhausted(mut self, policy: ExhaustedPolicy) -> Self {
        self.when_exhausted = policy;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_block_without_limit() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_size, 0);
        assert_eq!(opts.when_exhausted, ExhaustedPolicy::Block);
        assert_eq!(opts.timeout(), None);
    }

    #[test]
    fn empty_json_is_default() -> Result<(), DbError> {
        assert_eq!(PoolOptions::from_json("{}")?, PoolOptions::default());
        Ok(())
    }

    #[test]
    fn timeout_round_trips_through_json() -> Result<(), DbError> {
        let opts = PoolOptions::new()
            .max_size(2)
            .acquire_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&opts).map_err(|e| DbError::Other(e.to_string()))?;
        let parsed = PoolOptions::from_json(&json)?;
        assert_eq!(parsed.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(parsed.max_size, 2);
        Ok(())
    }

    #[test]
    fn bad_policy_is_config_error() {
        let err = PoolOptions::from_json(r#"{ "when_exhausted": "panic" }"#);
        assert!(matches!(err, Err(DbError::Config(_))));
    }
}
