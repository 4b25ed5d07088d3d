//! Server configuration loaded from environment variables.
//!
//! Everything has a development default except the identifier-derivation
//! secret, which must be provided. Starting without it is refused.

use std::time::Duration;

use unfiltered_shared::constants::{DEFAULT_HISTORY_LIMIT, MAX_MESSAGE_SIZE};
use unfiltered_shared::{ConfigError, ObfuscationSecret};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Secret keying identifier obfuscation. Rotating it invalidates every
    /// token previously handed to clients.
    /// Env: `ID_DERIVE_SECRET` (required)
    pub id_derive_secret: ObfuscationSecret,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Unfiltered"`
    pub instance_name: String,

    /// Maximum number of messages returned by a history fetch.
    /// Env: `HISTORY_LIMIT`
    /// Default: `50`
    pub history_limit: usize,

    /// Outbound queue depth per connection. A member whose queue is full
    /// misses real-time events and catches up from history.
    /// Env: `CONNECTION_BUFFER`
    /// Default: `256`
    pub connection_buffer: usize,

    /// Maximum decoded size of message content in bytes.
    /// Env: `MAX_CONTENT_SIZE`
    /// Default: `262144` (256 KiB)
    pub max_content_size: usize,

    /// How often room statistics are logged.
    /// Env: `STATS_INTERVAL_SECS`
    /// Default: `60`
    pub stats_interval: Duration,
}

impl ServerConfig {
    /// Configuration with defaults for everything but the secret.
    pub fn with_secret(secret: impl Into<ObfuscationSecret>) -> Self {
        Self {
            id_derive_secret: secret.into(),
            instance_name: "Unfiltered".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            connection_buffer: 256,
            max_content_size: MAX_MESSAGE_SIZE,
            stats_interval: Duration::from_secs(60),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("ID_DERIVE_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret("ID_DERIVE_SECRET"))?;
        let mut config = Self::with_secret(secret);

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.is_empty() {
                config.instance_name = name;
            }
        }

        if let Some(n) = parse_positive(&lookup, "HISTORY_LIMIT") {
            config.history_limit = n;
        }

        if let Some(n) = parse_positive(&lookup, "CONNECTION_BUFFER") {
            config.connection_buffer = n;
        }

        if let Some(n) = parse_positive(&lookup, "MAX_CONTENT_SIZE") {
            config.max_content_size = n;
        }

        if let Some(n) = parse_positive(&lookup, "STATS_INTERVAL_SECS") {
            config.stats_interval = Duration::from_secs(n as u64);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        Ok(config)
    }
}

/// Parse a positive integer setting. Invalid values are logged and ignored.
fn parse_positive<F>(lookup: &F, key: &str) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %value, "Invalid setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingSecret("ID_DERIVE_SECRET")
        );
        assert!(ServerConfig::from_lookup(lookup(&[("ID_DERIVE_SECRET", "")])).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("ID_DERIVE_SECRET", "s1")])).unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.connection_buffer, 256);
        assert_eq!(config.max_content_size, MAX_MESSAGE_SIZE);
        assert_eq!(config.instance_name, "Unfiltered");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("ID_DERIVE_SECRET", "s1"),
            ("INSTANCE_NAME", "Test Node"),
            ("HISTORY_LIMIT", "20"),
            ("CONNECTION_BUFFER", "8"),
            ("STATS_INTERVAL_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.instance_name, "Test Node");
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.connection_buffer, 8);
        assert_eq!(config.stats_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("ID_DERIVE_SECRET", "s1"),
            ("HISTORY_LIMIT", "lots"),
            ("CONNECTION_BUFFER", "0"),
        ]))
        .unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.connection_buffer, 256);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ServerConfig::with_secret("do-not-print");
        assert!(!format!("{:?}", config).contains("do-not-print"));
    }
}
