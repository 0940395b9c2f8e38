pub mod config;
pub mod courier;
pub mod engine;
pub mod order;
pub mod query;
pub mod scheduler;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use engine::{EngineError, OrderLifecycle, Trigger};
