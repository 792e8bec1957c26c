use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// A required service or backend is missing from the locator, or the
    /// engine was wired with unusable settings. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The storage engine could not be reached or answered with something
    /// unusable. Recoverable by the caller, never retried here.
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QueryError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, QueryError::Configuration(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, QueryError::StorageIo(_) | QueryError::IoError(_))
    }

    /// Short stable label used for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Configuration(_) => "configuration",
            QueryError::StorageIo(_) | QueryError::IoError(_) => "storage_io",
            QueryError::InvalidCondition(_) => "invalid_condition",
            QueryError::SerializationError(_) => "serialization",
            QueryError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::StorageIo(format!("request timed out: {}", err))
        } else {
            QueryError::StorageIo(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
