//! Configuration management for users-core.

use serde::{Deserialize, Serialize};

/// Main configuration for the users-core library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersCoreConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub rate_limiters: RateLimitersConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for UsersCoreConfig {
    fn default() -> Self {
        Self {
            rate_limiters: RateLimitersConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Configuration for all rate limiters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitersConfig {
    /// Login attempt throttling
    #[serde(default)]
    pub user_login: UserLoginConfig,
}

/// Configuration for login attempt throttling.
///
/// Two windows apply to every attempt: a global per-IP window shared across
/// all accounts, and a narrower per-account window keyed by `(user, ip)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoginConfig {
    /// Whether login throttling is enabled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Global per-IP window
    #[serde(default = "default_ip_window")]
    pub ip: WindowSettings,

    /// Per-account window, keyed by `(user, ip)`
    #[serde(default = "default_user_ip_window")]
    pub user_ip: WindowSettings,
}

impl Default for UserLoginConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ip: default_ip_window(),
            user_ip: default_user_ip_window(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_ip_window() -> WindowSettings {
    WindowSettings {
        interval: 7 * 24 * 3600,
        attempts: 15,
        block_interval: None,
    }
}

fn default_user_ip_window() -> WindowSettings {
    WindowSettings {
        interval: 2 * 3600,
        attempts: 5,
        block_interval: None,
    }
}

/// Settings for a single sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Window span in seconds. `0` means entries never age out, so a
    /// saturated window stays saturated until explicit cleanup.
    pub interval: u64,

    /// Maximum number of reservations admitted within the window
    pub attempts: u32,

    /// How long a key stays hard-blocked after a rejected reservation,
    /// in seconds. Defaults to `interval` when not set.
    #[serde(default)]
    pub block_interval: Option<u64>,
}

/// Configuration for user and organization search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default page size for listing calls
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound a caller may request per page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

impl UsersCoreConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: UsersCoreConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::UsersCoreError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UsersCoreConfig::default();
        assert!(config.rate_limiters.user_login.enabled);
        assert_eq!(config.rate_limiters.user_login.user_ip.attempts, 5);
        assert_eq!(config.search.page_size, 10);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
rate_limiters:
  user_login:
    user_ip:
      interval: 600
      attempts: 3
"#;
        let config: UsersCoreConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.rate_limiters.user_login.enabled);
        assert_eq!(config.rate_limiters.user_login.user_ip.interval, 600);
        assert_eq!(config.rate_limiters.user_login.user_ip.attempts, 3);
        assert_eq!(config.rate_limiters.user_login.user_ip.block_interval, None);
        // untouched section keeps its defaults
        assert_eq!(config.rate_limiters.user_login.ip.attempts, 15);
        assert_eq!(config.search.max_page_size, 100);
    }

    #[test]
    fn test_parse_block_interval() {
        let yaml = r#"
interval: 3600
attempts: 10
block_interval: 7200
"#;
        let settings: WindowSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.block_interval, Some(7200));
    }
}
