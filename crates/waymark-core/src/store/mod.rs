//! State store contract and the built-in backends.
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral targets.
//! - [`FileStore`]: a JSON document on disk, rewritten on every push.

pub mod file;
pub mod memory;

use std::sync::Arc;

use crate::error::StoreError;
use crate::state::AppliedState;

pub use file::{CachePolicy, FileStore, FileStoreConfig};
pub use memory::MemoryStore;

/// Durable record of applied migration identifiers.
///
/// Implementations must uphold:
/// - `load` returns an owned copy; mutating it never affects the store.
/// - `load` on a store that was never written returns an empty state.
/// - once `push` returns `Ok`, the next `load` observes the appended id.
///
/// Stores provide no cross-process coordination.
pub trait StateStore {
    /// Read the current applied state.
    fn load(&self) -> Result<AppliedState, StoreError>;

    /// Append `id` to the applied state.
    fn push(&self, id: &str) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> Result<AppliedState, StoreError> {
        (**self).load()
    }

    fn push(&self, id: &str) -> Result<(), StoreError> {
        (**self).push(id)
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&self) -> Result<AppliedState, StoreError> {
        (**self).load()
    }

    fn push(&self, id: &str) -> Result<(), StoreError> {
        (**self).push(id)
    }
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn load(&self) -> Result<AppliedState, StoreError> {
        (**self).load()
    }

    fn push(&self, id: &str) -> Result<(), StoreError> {
        (**self).push(id)
    }
}
