use crate::core::{PitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time registry configuration
///
/// Shared by node services (context limits, expiry sweeps) and the
/// coordinator (keep-alive bounds, per-node wait).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PitConfig {
    /// Keep-alive applied when a request does not carry one
    pub default_keep_alive_ms: u64,

    /// Upper bound for any requested keep-alive
    pub max_keep_alive_ms: u64,

    /// Maximum number of open reader contexts held by one node
    pub max_open_contexts_per_node: usize,

    /// Bounded wait for a single node request before it counts as unreachable
    pub node_request_timeout_ms: u64,

    /// Interval of the background expiry sweep (disabled when `None`)
    #[serde(default)]
    pub reaper_interval_ms: Option<u64>,
}

impl PitConfig {
    /// Create a configuration with default limits
    pub fn new() -> Self {
        Self {
            default_keep_alive_ms: 5 * 60_000,
            max_keep_alive_ms: 24 * 60 * 60_000,
            max_open_contexts_per_node: 300,
            node_request_timeout_ms: 5_000,
            reaper_interval_ms: None,
        }
    }

    /// Parse from a JSON document, filling unspecified fields with defaults
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        let defaults = serde_json::to_value(Self::new())?;
        if let (Some(fields), serde_json::Value::Object(base)) = (value.as_object_mut(), defaults)
        {
            for (key, default) in base {
                fields.entry(key).or_insert(default);
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Set default keep-alive
    pub fn default_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.default_keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    /// Set maximum keep-alive
    pub fn max_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.max_keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    /// Set maximum open contexts per node
    pub fn max_open_contexts_per_node(mut self, max: usize) -> Self {
        self.max_open_contexts_per_node = max;
        self
    }

    /// Set per-node request timeout
    pub fn node_request_timeout(mut self, timeout: Duration) -> Self {
        self.node_request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable the background expiry sweep
    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn node_request_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.node_request_timeout_ms)
    }

    /// Resolve a requested keep-alive against the configured bounds.
    pub fn resolve_keep_alive(&self, requested: Option<Duration>) -> Result<Duration> {
        let keep_alive =
            requested.unwrap_or_else(|| Duration::from_millis(self.default_keep_alive_ms));
        if keep_alive.is_zero() {
            return Err(PitError::InvalidKeepAlive(
                "keep-alive must be greater than zero".to_string(),
            ));
        }
        if keep_alive.as_millis() > u128::from(self.max_keep_alive_ms) {
            return Err(PitError::InvalidKeepAlive(format!(
                "keep-alive of {}ms exceeds the maximum of {}ms",
                keep_alive.as_millis(),
                self.max_keep_alive_ms
            )));
        }
        Ok(keep_alive)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_keep_alive_ms == 0 {
            return Err(PitError::Config("default_keep_alive_ms must be > 0".to_string()));
        }

        if self.default_keep_alive_ms > self.max_keep_alive_ms {
            return Err(PitError::Config(
                "default_keep_alive_ms cannot exceed max_keep_alive_ms".to_string(),
            ));
        }

        if self.max_open_contexts_per_node == 0 {
            return Err(PitError::Config("max_open_contexts_per_node must be > 0".to_string()));
        }

        if self.node_request_timeout_ms == 0 {
            return Err(PitError::Config("node_request_timeout_ms must be > 0".to_string()));
        }

        if self.reaper_interval_ms == Some(0) {
            return Err(PitError::Config("reaper_interval_ms must be > 0 when set".to_string()));
        }

        Ok(())
    }
}

impl Default for PitConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PitConfig::default();
        assert_eq!(config.max_open_contexts_per_node, 300);
        assert_eq!(config.max_keep_alive_ms, 86_400_000);
        assert!(config.reaper_interval_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PitConfig::new()
            .max_open_contexts_per_node(5)
            .node_request_timeout(Duration::from_millis(250))
            .reaper_interval(Duration::from_secs(1));

        assert_eq!(config.max_open_contexts_per_node, 5);
        assert_eq!(config.node_request_timeout_ms, 250);
        assert_eq!(config.reaper_interval_ms, Some(1_000));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = PitConfig::from_json_str(r#"{"max_open_contexts_per_node": 7}"#).unwrap();
        assert_eq!(config.max_open_contexts_per_node, 7);
        assert_eq!(config.node_request_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(PitConfig::from_json_str(r#"{"node_request_timeout_ms": 0}"#).is_err());
        assert!(PitConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_validate() {
        let invalid_default = PitConfig::new()
            .default_keep_alive(Duration::from_secs(10))
            .max_keep_alive(Duration::from_secs(5));
        assert!(invalid_default.validate().is_err());

        let invalid_limit = PitConfig::new().max_open_contexts_per_node(0);
        assert!(invalid_limit.validate().is_err());
    }

    #[test]
    fn test_resolve_keep_alive_bounds() {
        let config = PitConfig::new().max_keep_alive(Duration::from_secs(60));
        assert_eq!(
            config
                .resolve_keep_alive(Some(Duration::from_secs(30)))
                .unwrap(),
            Duration::from_secs(30)
        );
        assert!(matches!(
            config.resolve_keep_alive(Some(Duration::from_secs(61))),
            Err(PitError::InvalidKeepAlive(_))
        ));
        assert!(config.resolve_keep_alive(Some(Duration::ZERO)).is_err());
    }
}
