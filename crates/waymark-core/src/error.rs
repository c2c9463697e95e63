//! Error types for stores and reconciliation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type returned by migration units.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by a [`StateStore`](crate::store::StateStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the state file failed.
    #[error("io error on {}: {source}", .path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted document is not a valid applied state.
    #[error("invalid state document {}: {source}", .path.display())]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the state failed.
    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Reconciliation errors.
///
/// Every variant is fatal to the call that produced it. Positions are
/// 1-indexed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The store could not be read.
    #[error("failed to load applied state: {0}")]
    StateUnavailable(#[source] StoreError),

    /// The store records more applied migrations than are defined.
    #[error("applied migrations list ({applied}) is larger than provided migrations list ({defined})")]
    StateAheadOfDefinition {
        /// Number of recorded identifiers.
        applied: usize,
        /// Number of supplied migrations.
        defined: usize,
    },

    /// The recorded history contains a repeated identifier.
    #[error("applied state is corrupt: \"{id}\" recorded at positions {first} and {second}")]
    CorruptState {
        /// The repeated identifier.
        id: String,
        /// First position.
        first: usize,
        /// Second position.
        second: usize,
    },

    /// The supplied migrations list contains a repeated identifier.
    #[error("migrations list defines \"{id}\" at positions {first} and {second}")]
    DuplicateDefinition {
        /// The repeated identifier.
        id: String,
        /// First position.
        first: usize,
        /// Second position.
        second: usize,
    },

    /// A supplied migration has an empty identifier.
    #[error("migration #{position} has an empty identifier")]
    EmptyIdentifier {
        /// Position of the offending migration.
        position: usize,
    },

    /// The recorded history does not match the supplied order.
    #[error("migration identifier does not match for migration #{position}: \"{recorded}\" != \"{expected}\"")]
    HistoryMismatch {
        /// Position of the mismatch.
        position: usize,
        /// Identifier found in the store.
        recorded: String,
        /// Identifier found in the migrations list.
        expected: String,
    },

    /// A migration failed; it was not recorded.
    #[error("migration #{position} \"{id}\" failed: {source}")]
    ExecutionFailed {
        /// The failed migration.
        id: String,
        /// Its position.
        position: usize,
        /// The migration's error.
        #[source]
        source: BoxError,
    },

    /// A migration succeeded but recording it failed.
    ///
    /// The side effect is applied but not recorded; the target and the store
    /// have diverged and must be repaired out of band.
    #[error("migration #{position} \"{id}\" was applied but could not be recorded: {source}")]
    PersistenceFailed {
        /// The applied migration.
        id: String,
        /// Its position.
        position: usize,
        /// The store's error.
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Whether the error was raised before any migration executed in the
    /// failing call.
    pub fn is_static(&self) -> bool {
        !matches!(
            self,
            ReconcileError::ExecutionFailed { .. } | ReconcileError::PersistenceFailed { .. }
        )
    }
}
