//! Pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the connection pool
///
/// All durations serialize as whole seconds for readability in TOML/JSON.
/// A zero `max_idle` or `max_lifetime` disables that check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// How long an entry may sit unused before it is evicted; zero disables
    #[serde(with = "duration_secs")]
    pub max_idle: Duration,

    /// How old an entry may grow before it is transparently replaced; zero disables
    #[serde(with = "duration_secs")]
    pub max_lifetime: Duration,

    /// Interval between background reaper passes
    #[serde(with = "duration_secs")]
    pub reap_interval: Duration,

    /// Bound on the TCP+SSH dial
    #[serde(with = "duration_secs")]
    pub dial_timeout: Duration,

    /// Bound on the liveness probe of a cached entry
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(3600),
            reap_interval: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Whether the idle check is enabled
    pub fn idle_enabled(&self) -> bool {
        !self.max_idle.is_zero()
    }

    /// Whether the lifetime check is enabled
    pub fn lifetime_enabled(&self) -> bool {
        !self.max_lifetime.is_zero()
    }
}

/// Helper module for Duration serialization as seconds
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle, Duration::from_secs(600));
        assert_eq!(config.max_lifetime, Duration::from_secs(3600));
        assert!(config.idle_enabled());
        assert!(config.lifetime_enabled());
    }

    #[test]
    fn test_zero_disables_checks() {
        let config = PoolConfig {
            max_idle: Duration::ZERO,
            max_lifetime: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(!config.idle_enabled());
        assert!(!config.lifetime_enabled());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = PoolConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: PoolConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_partial_toml_uses_defaults() {
        let parsed: PoolConfig = toml::from_str("max_lifetime = 1\n").unwrap();
        assert_eq!(parsed.max_lifetime, Duration::from_secs(1));
        assert_eq!(parsed.max_idle, Duration::from_secs(600));
    }
}
