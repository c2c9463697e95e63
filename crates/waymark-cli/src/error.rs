//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;
use waymark_core::StoreError;

use crate::commands::EXIT_ERROR;

/// CLI errors.
#[derive(Debug, Error)]
pub enum Error {
    /// State store error.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The manifest could not be read.
    #[error("failed to read manifest {}: {source}", .path.display())]
    Manifest {
        /// Manifest path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The identifier is already recorded.
    #[error("\"{0}\" is already recorded")]
    AlreadyRecorded(String),

    /// An empty identifier was given.
    #[error("identifier must not be empty")]
    EmptyIdentifier,
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        EXIT_ERROR
    }
}
