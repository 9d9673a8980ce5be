//! Persistence adapters.
//!
//! # Responsibility
//! - Serialize/deserialize collection snapshots into durable storage.
//! - Keep SQL and codec details out of the store.
//!
//! # Invariants
//! - Adapters hold no business logic beyond record validation on read.

pub mod snapshot_repo;
