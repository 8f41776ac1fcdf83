//! Error types for clustering, heat-map and configuration operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoclusterError {
    /// An argument was rejected; prior state is left untouched.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation has no mapping in this crate.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cancellable computation observed its token before finishing.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, GeoclusterError>;
