//! Waymark Core - applied-migration tracking and reconciliation.
//!
//! A migration is any named unit of side-effecting work. This crate records
//! which migrations have been applied, in order, and applies exactly the
//! ones that have not, stopping at the first failure.
//!
//! # Example
//!
//! ```
//! use waymark_core::{migration, reconcile_all, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let migrations = vec![
//!     migration("create-users", |log: &mut Vec<String>| {
//!         log.push("users".to_string());
//!         Ok(())
//!     }),
//!     migration("create-posts", |log: &mut Vec<String>| {
//!         log.push("posts".to_string());
//!         Ok(())
//!     }),
//! ];
//!
//! let mut log: Vec<String> = Vec::new();
//! let report = reconcile_all(&store, &migrations, &mut log).unwrap();
//! assert_eq!(report.applied, vec!["create-users", "create-posts"]);
//!
//! // A second run verifies history and executes nothing.
//! let report = reconcile_all(&store, &migrations, &mut log).unwrap();
//! assert!(report.applied.is_empty());
//! assert_eq!(log, vec!["users", "posts"]);
//! ```
//!
//! # Limitations
//!
//! Concurrent reconciliation against the same store from different threads
//! or processes is not coordinated. Callers that need it must hold an
//! external lock for the duration of the call.

pub mod engine;
pub mod error;
pub mod migration;
pub mod state;
pub mod store;

pub use engine::{check_history, plan, reconcile_all, Migrator, ReconcilePlan, ReconcileReport};
pub use error::{BoxError, ReconcileError, StoreError};
pub use migration::{migration, FnMigration, Migration};
pub use state::{AppliedState, Duplicate};
pub use store::{CachePolicy, FileStore, FileStoreConfig, MemoryStore, StateStore};
