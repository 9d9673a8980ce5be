//! Flutter bridge for the Tally ledger core.

pub mod api;
