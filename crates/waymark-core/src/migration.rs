//! The migration unit contract.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

/// A named, one-time unit of side-effecting work.
///
/// Units are expected to be idempotent: a side effect that was applied but
/// could not be recorded will run again on the next reconciliation.
pub trait Migration<C = ()> {
    /// Identifier, unique and non-empty within one migrations list.
    fn id(&self) -> &str;

    /// Apply the migration against the target reachable through `context`.
    fn apply(&self, context: &mut C) -> Result<(), BoxError>;

    /// Human-readable description, used in log output.
    fn description(&self) -> Option<&str> {
        None
    }
}

impl<C, M: Migration<C> + ?Sized> Migration<C> for Box<M> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn apply(&self, context: &mut C) -> Result<(), BoxError> {
        (**self).apply(context)
    }

    fn description(&self) -> Option<&str> {
        (**self).description()
    }
}

impl<C, M: Migration<C> + ?Sized> Migration<C> for Arc<M> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn apply(&self, context: &mut C) -> Result<(), BoxError> {
        (**self).apply(context)
    }

    fn description(&self) -> Option<&str> {
        (**self).description()
    }
}

impl<C, M: Migration<C> + ?Sized> Migration<C> for &M {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn apply(&self, context: &mut C) -> Result<(), BoxError> {
        (**self).apply(context)
    }

    fn description(&self) -> Option<&str> {
        (**self).description()
    }
}

type ApplyFn<C> = Box<dyn Fn(&mut C) -> Result<(), BoxError> + Send + Sync>;

/// A migration backed by a closure.
pub struct FnMigration<C> {
    id: String,
    description: Option<String>,
    apply: ApplyFn<C>,
}

/// Create a closure-backed migration.
pub fn migration<C, F>(id: impl Into<String>, apply: F) -> FnMigration<C>
where
    F: Fn(&mut C) -> Result<(), BoxError> + Send + Sync + 'static,
{
    FnMigration {
        id: id.into(),
        description: None,
        apply: Box::new(apply),
    }
}

impl<C> FnMigration<C> {
    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<C> Migration<C> for FnMigration<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, context: &mut C) -> Result<(), BoxError> {
        (self.apply)(context)
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl<C> fmt::Debug for FnMigration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMigration")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
