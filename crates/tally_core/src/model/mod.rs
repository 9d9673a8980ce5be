//! Ledger domain model.
//!
//! # Responsibility
//! - Define the canonical record used by store and persistence layers.
//!
//! # Invariants
//! - Every record is identified by a stable `ContributionId`.
//! - Deletion is a hard removal; no tombstones are kept.

pub mod contribution;
