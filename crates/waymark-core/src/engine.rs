//! Reconciliation engine.
//!
//! Compares the recorded history in a [`StateStore`] against the full,
//! ordered migrations list and applies exactly the unapplied suffix.
//!
//! A call runs in two phases. The recorded prefix is verified first, with no
//! side effects: history may not be longer than the list, may not contain
//! repeats, and must match the list position by position. The remaining
//! migrations are then applied one at a time, each recorded before the next
//! one starts. The first failure stops the call; nothing is rolled back and
//! the failed migration is not recorded, so the next call resumes at the
//! same position.

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::error::ReconcileError;
use crate::migration::Migration;
use crate::state::{first_duplicate, AppliedState};
use crate::store::StateStore;

/// Outcome of a successful [`reconcile_all`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Number of migrations found already recorded and verified.
    pub verified: usize,
    /// Identifiers applied by this call, in order.
    pub applied: Vec<String>,
}

impl ReconcileReport {
    /// Whether this call applied nothing.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// What a reconciliation would do, computed without side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Recorded identifiers that match the migrations list.
    pub verified: Vec<String>,
    /// Identifiers that would be applied, in order.
    pub pending: Vec<String>,
}

impl ReconcilePlan {
    /// Whether there is nothing to apply.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Validate recorded history against the defined identifiers.
///
/// Returns the length of the verified prefix, which is also the position
/// (0-based) of the first migration to apply. Checks, in order:
/// history length, repeats in history, empty or repeated definitions, and
/// positional agreement.
pub fn check_history<I: AsRef<str>>(
    applied: &AppliedState,
    defined: &[I],
) -> Result<usize, ReconcileError> {
    if applied.len() > defined.len() {
        return Err(ReconcileError::StateAheadOfDefinition {
            applied: applied.len(),
            defined: defined.len(),
        });
    }

    if let Some(dup) = applied.first_duplicate() {
        return Err(ReconcileError::CorruptState {
            id: dup.id,
            first: dup.first,
            second: dup.second,
        });
    }

    if let Some(idx) = defined.iter().position(|id| id.as_ref().is_empty()) {
        return Err(ReconcileError::EmptyIdentifier { position: idx + 1 });
    }

    if let Some(dup) = first_duplicate(defined.iter().map(|id| id.as_ref())) {
        return Err(ReconcileError::DuplicateDefinition {
            id: dup.id,
            first: dup.first,
            second: dup.second,
        });
    }

    for (idx, (recorded, expected)) in applied.ids().iter().zip(defined).enumerate() {
        let expected = expected.as_ref();
        if recorded != expected {
            return Err(ReconcileError::HistoryMismatch {
                position: idx + 1,
                recorded: recorded.clone(),
                expected: expected.to_string(),
            });
        }
    }

    Ok(applied.len())
}

/// Compute what [`reconcile_all`] would do without executing anything.
pub fn plan<S, M, C>(store: &S, migrations: &[M]) -> Result<ReconcilePlan, ReconcileError>
where
    S: StateStore + ?Sized,
    M: Migration<C>,
{
    let state = store.load().map_err(ReconcileError::StateUnavailable)?;
    let ids: Vec<&str> = migrations.iter().map(|m| m.id()).collect();
    let verified = check_history(&state, &ids)?;

    Ok(ReconcilePlan {
        verified: state.applied_identifiers,
        pending: ids[verified..].iter().map(|id| id.to_string()).collect(),
    })
}

/// Apply every migration in `migrations` that `store` has not recorded.
///
/// The store is read once. All validation happens before the first
/// migration runs. Each applied migration is pushed to the store before the
/// next one starts; on any failure the call stops and returns the error.
///
/// Calling this again with the same list and store applies nothing.
#[instrument(skip_all, fields(defined = migrations.len()))]
pub fn reconcile_all<S, M, C>(
    store: &S,
    migrations: &[M],
    context: &mut C,
) -> Result<ReconcileReport, ReconcileError>
where
    S: StateStore + ?Sized,
    M: Migration<C>,
{
    let state = store.load().map_err(ReconcileError::StateUnavailable)?;
    let ids: Vec<&str> = migrations.iter().map(|m| m.id()).collect();
    let verified = check_history(&state, &ids)?;

    debug!(
        verified,
        pending = migrations.len() - verified,
        "applied history verified"
    );

    let mut report = ReconcileReport {
        verified,
        applied: Vec::with_capacity(migrations.len() - verified),
    };

    for (idx, migration) in migrations.iter().enumerate().skip(verified) {
        let id = migration.id();
        let position = idx + 1;
        let start = Instant::now();

        migration
            .apply(context)
            .map_err(|source| ReconcileError::ExecutionFailed {
                id: id.to_string(),
                position,
                source,
            })?;

        store
            .push(id)
            .map_err(|source| ReconcileError::PersistenceFailed {
                id: id.to_string(),
                position,
                source,
            })?;

        info!(
            migration = id,
            position,
            description = ?migration.description(),
            duration_ms = start.elapsed().as_millis() as u64,
            "migration applied"
        );
        report.applied.push(id.to_string());
    }

    if report.is_noop() {
        debug!(verified, "no pending migrations");
    } else {
        info!(
            verified,
            applied = report.applied.len(),
            "reconciliation completed"
        );
    }

    Ok(report)
}

/// A store paired with its ordered migrations list.
pub struct Migrator<S, C = ()> {
    store: S,
    migrations: Vec<Box<dyn Migration<C>>>,
}

impl<S: StateStore, C> Migrator<S, C> {
    /// Create a migrator with no migrations.
    pub fn new(store: S) -> Self {
        Self {
            store,
            migrations: Vec::new(),
        }
    }

    /// Append a migration to the end of the list.
    pub fn with_migration(mut self, migration: impl Migration<C> + 'static) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Append migrations to the end of the list, in order.
    pub fn with_migrations<I>(mut self, migrations: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Migration<C>>>,
    {
        self.migrations.extend(migrations);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identifiers of the migrations list, in order.
    pub fn ids(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.id()).collect()
    }

    /// See [`plan`].
    pub fn plan(&self) -> Result<ReconcilePlan, ReconcileError> {
        plan::<S, _, C>(&self.store, self.migrations.as_slice())
    }

    /// See [`reconcile_all`].
    pub fn run(&self, context: &mut C) -> Result<ReconcileReport, ReconcileError> {
        reconcile_all::<S, _, C>(&self.store, self.migrations.as_slice(), context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, StoreError};
    use crate::migration::{migration, FnMigration};
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every call so tests can assert what ran and in which order.
    #[derive(Debug, Default)]
    struct Target {
        value: u32,
        calls: Vec<String>,
    }

    fn step(id: &str, value: u32) -> FnMigration<Target> {
        let name = id.to_string();
        migration(id, move |target: &mut Target| {
            target.value = value;
            target.calls.push(name.clone());
            Ok(())
        })
    }

    fn failing(id: &str) -> FnMigration<Target> {
        let name = id.to_string();
        migration(id, move |target: &mut Target| {
            target.calls.push(name.clone());
            Err("Test error".into())
        })
    }

    fn steps(ids: &[&str]) -> Vec<FnMigration<Target>> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| step(id, i as u32 + 1))
            .collect()
    }

    /// Memory store whose push fails for one identifier.
    struct FlakyStore {
        inner: MemoryStore,
        fail_on: String,
    }

    impl StateStore for FlakyStore {
        fn load(&self) -> Result<AppliedState, StoreError> {
            self.inner.load()
        }

        fn push(&self, id: &str) -> Result<(), StoreError> {
            if id == self.fail_on {
                return Err(StoreError::Io {
                    path: "state.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.push(id)
        }
    }

    /// Memory store that counts loads.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        loads: AtomicUsize,
    }

    impl StateStore for CountingStore {
        fn load(&self) -> Result<AppliedState, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load()
        }

        fn push(&self, id: &str) -> Result<(), StoreError> {
            self.inner.push(id)
        }
    }

    #[test]
    fn test_first_run_applies_all_in_order() {
        let store = MemoryStore::new();
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        let report = reconcile_all(&store, &migrations, &mut target).unwrap();

        assert_eq!(report.verified, 0);
        assert_eq!(report.applied, ["1", "2", "3"]);
        assert_eq!(target.calls, ["1", "2", "3"]);
        assert_eq!(target.value, 3);
        assert_eq!(store.snapshot().ids(), ["1", "2", "3"]);
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let store = MemoryStore::new();
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        reconcile_all(&store, &migrations, &mut target).unwrap();
        let report = reconcile_all(&store, &migrations, &mut target).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.verified, 3);
        assert_eq!(target.calls.len(), 3);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn test_extension_applies_only_new_suffix() {
        let store = MemoryStore::with_applied(["1", "2", "3"]);
        let migrations = steps(&["1", "2", "3", "4", "5"]);
        let mut target = Target::default();

        let report = reconcile_all(&store, &migrations, &mut target).unwrap();

        assert_eq!(report.applied, ["4", "5"]);
        assert_eq!(target.calls, ["4", "5"]);
        assert_eq!(target.value, 5);
        assert_eq!(store.snapshot().ids(), ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_state_ahead_of_definition() {
        let store = MemoryStore::with_applied(["1", "2", "3", "ghost"]);
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::StateAheadOfDefinition {
                applied: 4,
                defined: 3
            }
        ));
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_reordered_history_is_rejected() {
        let store = MemoryStore::with_applied(["2", "1"]);
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        match err {
            ReconcileError::HistoryMismatch {
                position,
                recorded,
                expected,
            } => {
                assert_eq!(position, 1);
                assert_eq!(recorded, "2");
                assert_eq!(expected, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(target.calls.is_empty());
        assert_eq!(store.snapshot().ids(), ["2", "1"]);
    }

    #[test]
    fn test_duplicate_definition_rejected_before_execution() {
        let store = MemoryStore::new();
        let migrations = steps(&["1", "2", "3", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::DuplicateDefinition { ref id, first: 3, second: 4 } if id == "3"
        ));
        assert!(target.calls.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_duplicate_definition_rejected_with_consistent_history() {
        let store = MemoryStore::with_applied(["1", "2"]);
        let migrations = steps(&["1", "2", "3", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::DuplicateDefinition { ref id, first: 3, second: 4 } if id == "3"
        ));
        assert!(target.calls.is_empty());
        assert_eq!(store.snapshot().ids(), ["1", "2"]);
    }

    #[test]
    fn test_store_is_loaded_once() {
        let store = CountingStore::default();
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        reconcile_all(&store, &migrations, &mut target).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.snapshot().ids(), ["1", "2", "3"]);

        reconcile_all(&store, &migrations, &mut target).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let store = MemoryStore::with_applied(["1", "1"]);
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(err, ReconcileError::CorruptState { ref id, .. } if id == "1"));
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let store = MemoryStore::new();
        let migrations = steps(&["1", ""]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(err, ReconcileError::EmptyIdentifier { position: 2 }));
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_failure_stops_run_and_records_nothing_for_failed() {
        let store = MemoryStore::new();
        let migrations = vec![step("1", 1), failing("2"), step("3", 3)];
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        match err {
            ReconcileError::ExecutionFailed { id, position, source } => {
                assert_eq!(id, "2");
                assert_eq!(position, 2);
                assert_eq!(source.to_string(), "Test error");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(target.calls, ["1", "2"]);
        assert_eq!(target.value, 1);
        assert_eq!(store.snapshot().ids(), ["1"]);
    }

    #[test]
    fn test_resume_after_fix_retries_failed_position() {
        let store = MemoryStore::new();
        let mut target = Target::default();

        let broken = vec![step("1", 1), failing("2"), step("3", 3)];
        assert!(reconcile_all(&store, &broken, &mut target).is_err());

        target.calls.clear();
        let fixed = steps(&["1", "2", "3"]);
        let report = reconcile_all(&store, &fixed, &mut target).unwrap();

        assert_eq!(report.verified, 1);
        assert_eq!(report.applied, ["2", "3"]);
        assert_eq!(target.calls, ["2", "3"]);
        assert_eq!(store.snapshot().ids(), ["1", "2", "3"]);
    }

    #[test]
    fn test_persistence_failure_halts_with_divergence() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            fail_on: "2".to_string(),
        };
        let migrations = steps(&["1", "2", "3"]);
        let mut target = Target::default();

        let err = reconcile_all(&store, &migrations, &mut target).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::PersistenceFailed { ref id, position: 2, .. } if id == "2"
        ));
        // Applied but unrecorded.
        assert_eq!(target.calls, ["1", "2"]);
        assert_eq!(store.inner.snapshot().ids(), ["1"]);
    }

    #[test]
    fn test_context_is_forwarded_to_every_unit() {
        let store = MemoryStore::new();
        let migrations: Vec<FnMigration<Vec<u64>>> = (0..3)
            .map(|i| {
                migration(format!("m{i}"), move |seen: &mut Vec<u64>| {
                    seen.push(i);
                    Ok(())
                })
            })
            .collect();

        let mut seen = vec![42];
        reconcile_all(&store, &migrations, &mut seen).unwrap();

        assert_eq!(seen, [42, 0, 1, 2]);
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let store = MemoryStore::with_applied(["1"]);
        let migrations = steps(&["1", "2", "3"]);

        let plan = plan(&store, &migrations).unwrap();

        assert_eq!(plan.verified, ["1"]);
        assert_eq!(plan.pending, ["2", "3"]);
        assert!(!plan.is_up_to_date());
        assert_eq!(store.snapshot().ids(), ["1"]);
    }

    #[test]
    fn test_check_history_on_plain_ids() {
        let applied = AppliedState::from_ids(["a", "b"]);

        assert_eq!(check_history(&applied, &["a", "b", "c"]).unwrap(), 2);
        assert_eq!(check_history(&applied, &["a", "b"]).unwrap(), 2);
        assert!(matches!(
            check_history(&applied, &["a", "c", "b"]),
            Err(ReconcileError::HistoryMismatch { position: 2, .. })
        ));
        assert!(matches!(
            check_history(&AppliedState::empty(), &["x", "x"]),
            Err(ReconcileError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn test_size_check_precedes_other_checks() {
        // History is both too long and repeated; the size check wins.
        let applied = AppliedState::from_ids(["a", "a", "b"]);
        assert!(matches!(
            check_history(&applied, &["a", "b"]),
            Err(ReconcileError::StateAheadOfDefinition { .. })
        ));
    }

    struct CreateTable(&'static str);

    impl Migration<Vec<String>> for CreateTable {
        fn id(&self) -> &str {
            self.0
        }

        fn apply(&self, log: &mut Vec<String>) -> Result<(), BoxError> {
            log.push(format!("CREATE TABLE {}", self.0));
            Ok(())
        }

        fn description(&self) -> Option<&str> {
            Some("create table")
        }
    }

    #[test]
    fn test_migrator_runs_mixed_units() {
        let migrator = Migrator::new(MemoryStore::new())
            .with_migration(CreateTable("users"))
            .with_migration(migration("seed", |log: &mut Vec<String>| {
                log.push("INSERT".to_string());
                Ok(())
            }))
            .with_migrations(vec![
                Box::new(CreateTable("posts")) as Box<dyn Migration<Vec<String>>>
            ]);

        assert_eq!(migrator.ids(), ["users", "seed", "posts"]);
        assert_eq!(migrator.plan().unwrap().pending, ["users", "seed", "posts"]);

        let mut log = Vec::new();
        let report = migrator.run(&mut log).unwrap();

        assert_eq!(report.applied.len(), 3);
        assert_eq!(
            log,
            ["CREATE TABLE users", "INSERT", "CREATE TABLE posts"]
        );
        assert!(migrator.run(&mut log).unwrap().is_noop());
        assert!(migrator.plan().unwrap().is_up_to_date());
        assert_eq!(migrator.store().snapshot().len(), 3);
    }
}
