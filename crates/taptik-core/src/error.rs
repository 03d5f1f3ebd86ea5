use crate::types::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaptikError {
    #[error("no {platform} configuration detected at {path}")]
    NotDetected { platform: Platform, path: String },

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("no {0} configuration found in context")]
    MissingPlatformConfig(Platform),

    #[error("conversion from {from} to {to} is not supported")]
    UnsupportedConversion { from: Platform, to: Platform },

    #[error("invalid platform '{0}': expected kiro, cursor or claude-code")]
    InvalidPlatform(String),

    #[error("invalid merge strategy '{0}': expected replace, merge or append")]
    InvalidMergeStrategy(String),

    #[error("transform '{transform}' failed: {message}")]
    Transform { transform: String, message: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaptikError>;
