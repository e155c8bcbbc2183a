// ABOUTME: Error types shared by the table and bucket migration pipelines
// ABOUTME: Distinguishes bad input, missing configuration, transport and driver failures

use thiserror::Error;

/// Errors raised while migrating tables or storage objects.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Malformed input, e.g. a table name without a schema qualifier
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required credential, endpoint or table list is absent
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// The storage API answered with a status the pipeline does not accept
    #[error("{operation} failed with HTTP {status}: {body}")]
    Transport {
        operation: String,
        status: u16,
        body: String,
    },

    /// Error reported by the PostgreSQL driver
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// The HTTP request could not be sent or its body could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Staging file I/O
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A listing page was not the expected JSON array
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage project URL cannot be used as a base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl MigrateError {
    pub fn transport(operation: impl Into<String>, status: u16, body: &[u8]) -> Self {
        MigrateError::Transport {
            operation: operation.into(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        MigrateError::MissingConfiguration(name.into())
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            MigrateError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
