use thiserror::Error;

/// Core error type for SyncWarden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Duplicate node name \"{0}\"")]
    DuplicateName(String),

    #[error("Node \"{0}\" not found")]
    NotFound(String),

    #[error("Node registry is full (capacity {0})")]
    CapacityExceeded(usize),

    #[error("Operation requires the primary node: {0}")]
    NotPrimary(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to change replication mode: {0}")]
    DemotionCommand(String),

    #[error("Refusing to start: {0}")]
    StartupConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl From<serde_json::Error> for WardenError {
    fn from(e: serde_json::Error) -> Self {
        WardenError::InvalidArgument(e.to_string())
    }
}

/// Result type alias using WardenError.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WardenError::DuplicateName("b".to_string());
        assert_eq!(err.to_string(), "Duplicate node name \"b\"");

        let err = WardenError::CapacityExceeded(3);
        assert_eq!(err.to_string(), "Node registry is full (capacity 3)");
    }
}
