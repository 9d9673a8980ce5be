//! Core use-case services.
//!
//! # Responsibility
//! - Own in-memory ledger state and orchestrate persistence around it.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod contribution_store;
