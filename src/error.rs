use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON input: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// Invariant violation at a construction boundary (negative length, non-positive speed, ...).
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Any failure reported by the persistence collaborator.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedInput(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Error::StorageFailure(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
