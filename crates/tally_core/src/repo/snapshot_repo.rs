//! Snapshot persistence for the contribution collection.
//!
//! # Responsibility
//! - Read/write the whole collection as one serialized blob in a durable
//!   key-value slot.
//! - Offer a soft `load`/`save` contract that logs and swallows failures.
//!
//! # Invariants
//! - Writes are full snapshots; a later write fully supersedes an earlier one.
//! - Read paths reject invalid persisted state (decode errors, invalid
//!   records, duplicate ids) instead of masking it.
//! - The adapter never mutates the collection it is given.

use crate::db::DbError;
use crate::model::contribution::{Contribution, ContributionValidationError};
use log::{debug, error, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Slot key holding the contribution collection.
pub const CONTRIBUTIONS_SLOT: &str = "contributions";

pub type PersistResult<T> = Result<T, PersistError>;

/// Persistence failure for snapshot reads and writes.
#[derive(Debug)]
pub enum PersistError {
    Db(DbError),
    Codec(serde_json::Error),
    InvalidData(String),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "snapshot codec error: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PersistError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

/// Durable storage for full-collection snapshots.
///
/// Implementors provide the fallible primitives; `load` and `save` are the
/// soft contract the store consumes.
pub trait SnapshotStore {
    /// Reads the last snapshot, or `None` when nothing was saved yet.
    fn read_snapshot(&self) -> PersistResult<Option<Vec<Contribution>>>;

    /// Replaces the stored snapshot with `contributions`.
    fn write_snapshot(&self, contributions: &[Contribution]) -> PersistResult<()>;

    /// Loads the collection, treating any failure as "no data".
    fn load(&self) -> Vec<Contribution> {
        match self.read_snapshot() {
            Ok(Some(contributions)) => {
                debug!(
                    "event=snapshot_load module=repo status=ok count={}",
                    contributions.len()
                );
                contributions
            }
            Ok(None) => {
                debug!("event=snapshot_load module=repo status=empty");
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "event=snapshot_load module=repo status=error error_code=snapshot_unreadable fallback=empty error={err}"
                );
                Vec::new()
            }
        }
    }

    /// Saves the collection; returns `false` on failure instead of erroring.
    fn save(&self, contributions: &[Contribution]) -> bool {
        match self.write_snapshot(contributions) {
            Ok(()) => {
                debug!(
                    "event=snapshot_save module=repo status=ok count={}",
                    contributions.len()
                );
                true
            }
            Err(err) => {
                error!(
                    "event=snapshot_save module=repo status=error error_code=snapshot_write_failed count={} error={err}",
                    contributions.len()
                );
                false
            }
        }
    }
}

/// SQLite-backed snapshot slot.
///
/// Owns its connection so a store can live for the whole process.
pub struct SqliteSnapshotStore {
    conn: Connection,
    key: String,
}

impl SqliteSnapshotStore {
    /// Uses the default contributions slot on a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self::with_key(conn, CONTRIBUTIONS_SLOT)
    }

    /// Uses a caller-chosen slot key on a migrated connection.
    pub fn with_key(conn: Connection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn read_snapshot(&self) -> PersistResult<Option<Vec<Contribution>>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?1;",
                [self.key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => decode_snapshot(&payload).map(Some),
            None => Ok(None),
        }
    }

    fn write_snapshot(&self, contributions: &[Contribution]) -> PersistResult<()> {
        let payload = encode_snapshot(contributions)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO snapshots (key, payload, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![self.key.as_str(), payload],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Serializes a collection as a JSON array in collection order.
pub fn encode_snapshot(contributions: &[Contribution]) -> PersistResult<String> {
    Ok(serde_json::to_string(contributions)?)
}

/// Parses and checks a serialized collection.
pub fn decode_snapshot(payload: &str) -> PersistResult<Vec<Contribution>> {
    let contributions: Vec<Contribution> = serde_json::from_str(payload)?;
    let mut seen = HashSet::with_capacity(contributions.len());

    for (index, contribution) in contributions.iter().enumerate() {
        contribution
            .validate()
            .map_err(|err| invalid_record(index, &err))?;
        if !seen.insert(contribution.id) {
            return Err(PersistError::InvalidData(format!(
                "duplicate contribution id {} at index {index}",
                contribution.id
            )));
        }
    }

    Ok(contributions)
}

fn invalid_record(index: usize, err: &ContributionValidationError) -> PersistError {
    PersistError::InvalidData(format!("record {index}: {err}"))
}
