use idbridge_core::{ConfigError, DataError};

/// Errors surfaced by the connector layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("invalid configuration document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
    #[error("unknown table: {name}")]
    UnknownTable { name: String },
    #[error("unknown destination: {name}")]
    UnknownDestination { name: String },
    #[error("attribute '{attribute}' accepts a single value, got {count}")]
    MultiValuedScalar { attribute: String, count: usize },
    #[error("remote call failed: {0}")]
    Remote(#[from] anyhow::Error),
}
