//! Error types for catchup.

/// Top-level error type for the digest engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-related errors. These abort the current digest run.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Search provider errors. The fetch adapter degrades these to empty
/// per-topic results; they never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Provider request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid response from provider: {reason}")]
    InvalidResponse { reason: String },

    #[error("Provider returned status {status}")]
    Status { status: u16 },
}

/// Email transport errors. Surfaced as per-subscriber send outcomes.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    BuildFailed(String),

    #[error("SMTP send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias for the digest engine.
pub type Result<T> = std::result::Result<T, Error>;
