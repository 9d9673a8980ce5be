//! Contribution store use-case service.
//!
//! # Responsibility
//! - Own the in-memory contribution collection and the edit reference.
//! - Run every mutation as "validate, mutate, then save full snapshot".
//! - Derive recency listing and totals without touching stored order.
//!
//! # Invariants
//! - Collection order is insertion order; display order is derived.
//! - A rejected call (validation or not-found) never mutates or saves.
//! - Save failures never roll back in-memory state.
//! - At most one record is referenced as "currently editing".

use crate::model::contribution::{
    Contribution, ContributionFields, ContributionId, ContributionValidationError,
};
use crate::repo::snapshot_repo::SnapshotStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Non-fatal store failures reported back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input failed validation; nothing changed.
    Validation(ContributionValidationError),
    /// No record with this id exists.
    NotFound(ContributionId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "contribution not found: {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<ContributionValidationError> for StoreError {
    fn from(value: ContributionValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Display order for `ContributionStore::list_ordered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Newest date first; equal dates keep insertion order.
    #[default]
    DateDescending,
    /// Oldest date first; equal dates keep insertion order.
    DateAscending,
    /// Stored order.
    Insertion,
}

/// Sorted, restartable view over the store's records.
///
/// Borrowing the store keeps the view consistent: no mutation can happen
/// while a view is alive.
#[derive(Debug, Clone)]
pub struct RecencyView<'a> {
    records: &'a [Contribution],
    order: Vec<usize>,
}

impl<'a> RecencyView<'a> {
    fn new(records: &'a [Contribution], order: ListOrder) -> Self {
        let mut indices: Vec<usize> = (0..records.len()).collect();
        // `sort_by` is stable, which gives insertion-order tie breaks.
        match order {
            ListOrder::DateDescending => {
                indices.sort_by(|&a, &b| records[b].date.cmp(&records[a].date));
            }
            ListOrder::DateAscending => {
                indices.sort_by(|&a, &b| records[a].date.cmp(&records[b].date));
            }
            ListOrder::Insertion => {}
        }
        Self {
            records,
            order: indices,
        }
    }

    /// Starts a fresh pass over the view.
    pub fn iter(&self) -> impl Iterator<Item = &'a Contribution> + Clone + '_ {
        let records = self.records;
        self.order.iter().map(move |&index| &records[index])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Collects owned copies, e.g. for crossing an FFI boundary.
    pub fn to_vec(&self) -> Vec<Contribution> {
        self.iter().cloned().collect()
    }
}

/// In-memory ledger synchronized to a snapshot store.
pub struct ContributionStore<S: SnapshotStore> {
    records: Vec<Contribution>,
    editing: Option<ContributionId>,
    snapshots: S,
    last_save_ok: bool,
}

impl<S: SnapshotStore> ContributionStore<S> {
    /// Opens a store seeded from the last persisted snapshot.
    ///
    /// An unreadable snapshot yields an empty store (see `SnapshotStore::load`).
    pub fn open(snapshots: S) -> Self {
        let records = snapshots.load();
        info!(
            "event=store_open module=store status=ok count={}",
            records.len()
        );
        Self {
            records,
            editing: None,
            snapshots,
            last_save_ok: true,
        }
    }

    /// Adds a contribution from raw presentation input.
    ///
    /// # Errors
    /// - `Validation` when name/amount/date are rejected; nothing is saved.
    pub fn add(&mut self, name: &str, amount: &str, date: &str) -> StoreResult<Contribution> {
        let fields = ContributionFields::parse(name, amount, date).map_err(|err| {
            warn!("event=contribution_add module=store status=rejected reason={err}");
            err
        })?;

        let contribution = Contribution::new(fields);
        self.records.push(contribution.clone());
        self.persist();

        info!(
            "event=contribution_add module=store status=ok id={} count={}",
            contribution.id,
            self.records.len()
        );
        Ok(contribution)
    }

    /// Replaces the fields of an existing contribution, keeping its id.
    ///
    /// Clears the edit reference on success.
    ///
    /// # Errors
    /// - `Validation` when input is rejected (checked before lookup).
    /// - `NotFound` when `id` is not in the collection.
    pub fn update(
        &mut self,
        id: ContributionId,
        name: &str,
        amount: &str,
        date: &str,
    ) -> StoreResult<Contribution> {
        let fields = ContributionFields::parse(name, amount, date).map_err(|err| {
            warn!("event=contribution_update module=store status=rejected id={id} reason={err}");
            err
        })?;

        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.apply(fields);
        let updated = record.clone();

        self.persist();
        self.editing = None;

        info!("event=contribution_update module=store status=ok id={id}");
        Ok(updated)
    }

    /// Removes a contribution.
    ///
    /// Repeating the call for the same id is harmless and returns `NotFound`.
    pub fn remove(&mut self, id: ContributionId) -> StoreResult<()> {
        let Some(index) = self.position(id) else {
            info!("event=contribution_remove module=store status=not_found id={id}");
            return Err(StoreError::NotFound(id));
        };

        self.records.remove(index);
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.persist();

        info!(
            "event=contribution_remove module=store status=ok id={id} count={}",
            self.records.len()
        );
        Ok(())
    }

    /// Lists contributions newest first.
    pub fn list(&self) -> RecencyView<'_> {
        self.list_ordered(ListOrder::DateDescending)
    }

    pub fn list_ordered(&self, order: ListOrder) -> RecencyView<'_> {
        RecencyView::new(&self.records, order)
    }

    /// Sum of all amounts, rounded to two decimal places.
    pub fn total(&self) -> f64 {
        round_cents(self.exact_total())
    }

    /// Sum of all amounts at full precision.
    pub fn exact_total(&self) -> f64 {
        self.records.iter().map(|record| record.amount).sum()
    }

    /// Marks `id` as being edited and returns its current values for pre-fill.
    pub fn begin_edit(&mut self, id: ContributionId) -> StoreResult<Contribution> {
        let record = self.get(id).cloned().ok_or(StoreError::NotFound(id))?;
        self.editing = Some(id);
        Ok(record)
    }

    /// Drops the edit reference without touching any record.
    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Record currently being edited, if any.
    pub fn editing(&self) -> Option<&Contribution> {
        self.editing.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ContributionId) -> Option<&Contribution> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the most recent snapshot write succeeded.
    ///
    /// `true` before any write happened.
    pub fn last_save_succeeded(&self) -> bool {
        self.last_save_ok
    }

    pub fn snapshots(&self) -> &S {
        &self.snapshots
    }

    fn position(&self, id: ContributionId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn persist(&mut self) {
        self.last_save_ok = self.snapshots.save(&self.records);
    }
}

// 2^52 / 100: at or above this magnitude an `f64` has no cent digits left.
const CENT_PRECISION_LIMIT: f64 = 4_503_599_627_370_496.0 / 100.0;

/// Rounds to the nearest cent, halves away from zero.
///
/// Values too large to carry cents are returned unchanged.
pub fn round_cents(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= CENT_PRECISION_LIMIT {
        return value;
    }
    (value * 100.0).round() / 100.0
}
