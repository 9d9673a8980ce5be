//! Core domain logic for the Tally contribution ledger.
//! This crate owns the contribution collection and its persistence.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contribution::{
    Contribution, ContributionFields, ContributionId, ContributionValidationError,
};
pub use repo::snapshot_repo::{
    PersistError, PersistResult, SnapshotStore, SqliteSnapshotStore, CONTRIBUTIONS_SLOT,
};
pub use service::contribution_store::{
    ContributionStore, ListOrder, RecencyView, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
