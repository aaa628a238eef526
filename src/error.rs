use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("security material missing from '{0}'")]
    Missing(PathBuf),
    #[error("password salt in '{0}' must be exactly 16 bytes")]
    BadSalt(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("unable to configure CORS: {0}")]
    Cors(#[from] rocket_cors::Error),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error("unable to prepare upload directory: {0}")]
    Uploads(#[from] std::io::Error),
}
