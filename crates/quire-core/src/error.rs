//! Error types for quire-core

use thiserror::Error;

use crate::client::ClientError;

/// Result type alias using quire-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quire-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Delta client (transport, auth or API) error
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Local replica and server state disagree in a way a merge cannot fix
    #[error("Inconsistent data: {0}")]
    InconsistentData(String),

    /// Another writer raced us again after the catch-up pass
    #[error("Concurrent writer detected: expected usn {expected}, server assigned {actual}")]
    ConcurrentWriter { expected: i64, actual: i64 },

    /// Error raised while running a named sync stage
    #[error("Sync failed while {stage}: {source}")]
    Sync {
        stage: String,
        #[source]
        source: Box<Error>,
    },
}

/// Attach the sync stage that was running when an error surfaced.
pub trait SyncContext<T> {
    fn stage(self, stage: impl Into<String>) -> Result<T>;
}

impl<T, E> SyncContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn stage(self, stage: impl Into<String>) -> Result<T> {
        self.map_err(|error| Error::Sync {
            stage: stage.into(),
            source: Box::new(error.into()),
        })
    }
}

impl Error {
    /// Innermost error, skipping stage wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Sync { source, .. } => source.root(),
            other => other,
        }
    }
}
