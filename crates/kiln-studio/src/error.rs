use std::path::PathBuf;

use thiserror::Error;

use crate::creation::CreationError;

/// Errors raised while reading or writing the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to encode configuration: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Contract violations and refused operator actions.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("cart quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),
    #[error("unknown creatable type: {0}")]
    UnknownType(String),
    #[error("{0} is a single-instance type and cannot be favorited")]
    SingleInstanceFavorite(String),
    #[error("{0} is a single-instance type that already has an instance")]
    SingleInstanceExists(String),
    #[error("invalid value {value:?} for setting {key}")]
    InvalidSetting { key: String, value: String },
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error(transparent)]
    Creation(#[from] CreationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
