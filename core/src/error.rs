//! Error types for requester-core

use thiserror::Error;

use crate::config::ConfigError;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required builder field was not supplied
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Worker loop failed outside of request dispatch
    #[error("worker {id} failed: {message}")]
    Worker {
        /// Worker identifier
        id: usize,
        /// Failure description
        message: String,
    },

    /// Worker loop panicked previously and the worker must be rebuilt
    #[error("worker {0} is poisoned by an earlier loop failure")]
    Poisoned(usize),
}

impl Error {
    /// Create a worker failure error
    pub fn worker(id: usize, message: impl Into<String>) -> Self {
        Self::Worker {
            id,
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
