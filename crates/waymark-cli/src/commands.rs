//! Command implementations.

use std::path::Path;

use waymark_core::{check_history, StateStore};

use crate::error::Error;
use crate::manifest;

/// Exit code for a manifest that does not match recorded history.
pub const EXIT_INCONSISTENT: u8 = 1;

/// Exit code for an unreadable store or manifest.
pub const EXIT_ERROR: u8 = 2;

/// Recorded state, optionally compared against a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Recorded identifiers in application order.
    pub applied: Vec<String>,
    /// Identifiers that would be applied; `None` without a manifest or when
    /// validation failed.
    pub pending: Option<Vec<String>>,
    /// Validation failure against the manifest.
    pub error: Option<String>,
}

impl Status {
    /// Process exit code: 0 when consistent, [`EXIT_INCONSISTENT`] otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.error.is_some() {
            EXIT_INCONSISTENT
        } else {
            0
        }
    }
}

/// Load the recorded state and, given a manifest, validate it.
///
/// Validation failures are reported in [`Status::error`]; only store
/// failures are returned as errors.
pub fn status(store: &impl StateStore, manifest: Option<&[String]>) -> Result<Status, Error> {
    let state = store.load()?;

    let (pending, error) = match manifest {
        None => (None, None),
        Some(ids) => match check_history(&state, ids) {
            Ok(verified) => (Some(ids[verified..].to_vec()), None),
            Err(e) => (None, Some(e.to_string())),
        },
    };

    Ok(Status {
        applied: state.applied_identifiers,
        pending,
        error,
    })
}

/// Validate recorded history against the manifest at `path`.
///
/// Applies nothing. An unreadable manifest or store is returned as an error;
/// see [`Error::exit_code`].
pub fn check(store: &impl StateStore, path: &Path) -> Result<Status, Error> {
    let ids = manifest::load(path)?;
    status(store, Some(ids.as_slice()))
}

/// Record `id` as applied without executing anything.
///
/// Used after a migration's side effect was confirmed out of band but could
/// not be recorded.
pub fn mark(store: &impl StateStore, id: &str) -> Result<(), Error> {
    if id.is_empty() {
        return Err(Error::EmptyIdentifier);
    }
    if store.load()?.contains(id) {
        return Err(Error::AlreadyRecorded(id.to_string()));
    }
    store.push(id)?;
    Ok(())
}
