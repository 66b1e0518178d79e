pub mod app_config;
pub mod config;
pub mod merchant;
pub mod plugin;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use merchant::{encode_component, CacheKey, LookupQuery, MerchantCandidate, MerchantRecord};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("merchant name must not be empty")]
    Empty,
}
