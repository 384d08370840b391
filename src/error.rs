//! Error types for sensiscan

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sensiscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Transport-level errors talking to the classification service
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed. Check `api_key` in your sensiscan config.")]
    Unauthorized,

    #[error("Access denied. You don't have permission to access this project.")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to classification service".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failures of a single classification scan.
///
/// Every variant is fatal for the request that produced it.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Missing scan context: {0}")]
    MissingContext(#[source] SessionError),

    #[error("Classification job was not accepted: {0}")]
    Submission(String),

    #[error("Classification job {job_id} ended as {status}: [{code}] {message}")]
    JobFailed {
        job_id: String,
        status: String,
        code: String,
        message: String,
    },

    #[error("Classification job {job_id} did not finish after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    #[error("Scan task aborted: {0}")]
    Aborted(String),
}

/// Session resolution errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Incomplete session {handle}: missing {field}")]
    Incomplete { handle: String, field: &'static str },
}

/// Durable cache store errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache storage capacity exceeded")]
    CapacityExceeded,
}

impl CacheError {
    /// Whether this error means the store ran out of room.
    pub fn is_capacity(&self) -> bool {
        match self {
            CacheError::CapacityExceeded => true,
            CacheError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::DiskFull
            }
            _ => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Create ~/.sensiscan/config.yaml or pass --config.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Organization not configured. Set `org_id` in config or pass --org.")]
    MissingOrgId,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
