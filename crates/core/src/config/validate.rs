use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Vroong section, when present, carries url and credentials
/// - Scheduler interval is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(ref vroong) = config.couriers.vroong {
        if vroong.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "couriers.vroong.base_url cannot be empty".to_string(),
            ));
        }
        if vroong.api_key.is_empty() || vroong.api_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "couriers.vroong requires api_key and api_secret".to_string(),
            ));
        }
    }

    if config.scheduler.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
