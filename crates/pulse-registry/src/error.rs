use thiserror::Error;

/// Registry errors. Kept separate from the scheduler's errors so the gateway
/// can map each layer to HTTP status codes independently.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Input rejected before anything was stored. The message names the
    /// constraint that failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Key not found in registry: {key_name}")]
    NotFound { key_name: String },

    #[error("Key name already exists in registry: {key_name}")]
    Conflict { key_name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
