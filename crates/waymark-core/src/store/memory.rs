//! In-memory state store.

use parking_lot::Mutex;

use super::StateStore;
use crate::error::StoreError;
use crate::state::AppliedState;

/// Process-local [`StateStore`].
///
/// Never fails. Useful for tests and for targets whose lifetime matches the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<AppliedState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with pre-recorded history.
    pub fn with_applied<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(AppliedState::from_ids(ids)),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> AppliedState {
        self.state.lock().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<AppliedState, StoreError> {
        Ok(self.snapshot())
    }

    fn push(&self, id: &str) -> Result<(), StoreError> {
        self.state.lock().push(id);
        Ok(())
    }
}
