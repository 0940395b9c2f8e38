use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub couriers: CouriersConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("orderflow.db")
}

/// Courier agency configuration. Agencies without a section here are
/// unsupported at runtime.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CouriersConfig {
    #[serde(default)]
    pub vroong: Option<VroongConfig>,
}

/// Vroong gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VroongConfig {
    /// Vroong API base URL (e.g., "https://api.vroong.example")
    pub base_url: String,
    /// Vroong API key
    pub api_key: String,
    /// Vroong API secret
    pub api_secret: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// How many attempts a transient submit/cancel failure gets (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub couriers: SanitizedCouriersConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCouriersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vroong: Option<SanitizedVroongConfig>,
}

/// Sanitized Vroong config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedVroongConfig {
    pub base_url: String,
    pub credentials_configured: bool,
    pub timeout_secs: u32,
    pub max_retries: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            couriers: SanitizedCouriersConfig {
                vroong: config.couriers.vroong.as_ref().map(|v| SanitizedVroongConfig {
                    base_url: v.base_url.clone(),
                    credentials_configured: !v.api_key.is_empty() && !v.api_secret.is_empty(),
                    timeout_secs: v.timeout_secs,
                    max_retries: v.max_retries,
                }),
            },
            scheduler: config.scheduler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "orderflow.db");
        assert!(config.couriers.vroong.is_none());
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_secs, 60);
    }

    #[test]
    fn test_deserialize_server_overrides() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_vroong() {
        let toml = r#"
[couriers.vroong]
base_url = "https://api.vroong.example"
api_key = "test-key"
api_secret = "test-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let vroong = config.couriers.vroong.as_ref().unwrap();
        assert_eq!(vroong.base_url, "https://api.vroong.example");
        assert_eq!(vroong.timeout_secs, 10); // default
        assert_eq!(vroong.max_retries, 3); // default
    }

    #[test]
    fn test_deserialize_with_custom_database_path() {
        let toml = r#"
[database]
path = "/data/orders.sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "/data/orders.sqlite");
    }

    #[test]
    fn test_deserialize_scheduler_section() {
        let toml = r#"
[scheduler]
enabled = false
interval_secs = 30
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_secs, 30);
    }

    #[test]
    fn test_sanitized_config_hides_credentials() {
        let config = Config {
            couriers: CouriersConfig {
                vroong: Some(VroongConfig {
                    base_url: "https://api.vroong.example".to_string(),
                    api_key: "secret-key".to_string(),
                    api_secret: "secret-secret".to_string(),
                    timeout_secs: 15,
                    max_retries: 2,
                }),
            },
            ..Default::default()
        };

        let sanitized = SanitizedConfig::from(&config);
        let vroong = sanitized.couriers.vroong.as_ref().unwrap();
        assert_eq!(vroong.base_url, "https://api.vroong.example");
        assert!(vroong.credentials_configured);
        assert_eq!(vroong.timeout_secs, 15);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(!json.contains("secret-secret"));
    }

    #[test]
    fn test_sanitized_config_without_couriers() {
        let config = Config::default();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.couriers.vroong.is_none());
    }
}
