//! Error types for the tasks core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid range size: {0}, must be > 0")]
    InvalidRangeSize(i64),

    #[error("{0} already exists")]
    EntityAlreadyExists(String),

    #[error("{0}")]
    EntityNotFound(String),

    #[error("There's already a cache with name {0}")]
    CacheAlreadyExists(String),

    #[error("Store for {0} already exists")]
    StoreAlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Errors caused by the request itself rather than by the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_) | Error::EntityAlreadyExists(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntityNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
