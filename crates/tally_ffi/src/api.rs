//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the ledger store operations to Dart via FRB.
//! - Keep one process-wide store so the edit reference survives across calls.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every mutation goes through `ContributionStore`, which saves on success.
//! - The database path is resolved once per process.

use log::warn;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tally_core::db::open_db;
use tally_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, Contribution,
    ContributionId, ContributionStore, SqliteSnapshotStore, StoreError,
};
use uuid::Uuid;

const LEDGER_DB_FILE_NAME: &str = "tally_ledger.sqlite3";
const LEDGER_DB_PATH_ENV: &str = "TALLY_DB_PATH";

type LedgerStore = ContributionStore<SqliteSnapshotStore>;

static LEDGER_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static LEDGER: Mutex<Option<LedgerStore>> = Mutex::new(None);

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Default log level for the current build mode.
#[flutter_rust_bridge::frb(sync)]
pub fn default_log_level() -> String {
    tally_core::default_log_level().to_owned()
}

/// One ledger row as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Stable contribution ID in string form.
    pub id: String,
    pub name: String,
    /// Full-precision amount; format for display on the Dart side.
    pub amount: f64,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
}

/// Result envelope for single-record operations.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerActionResponse {
    /// Whether the operation was applied.
    pub ok: bool,
    /// Affected record, when the operation yields one.
    pub entry: Option<LedgerEntry>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl LedgerActionResponse {
    fn success(message: impl Into<String>, entry: Option<LedgerEntry>) -> Self {
        Self {
            ok: true,
            entry,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            entry: None,
            message: message.into(),
        }
    }
}

/// Listing envelope with the derived total.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerListResponse {
    /// Rows sorted newest date first; equal dates keep insertion order.
    pub items: Vec<LedgerEntry>,
    /// Sum of amounts rounded to two decimals.
    pub total: f64,
    /// ID of the record being edited, if any.
    pub editing_id: Option<String>,
    pub message: String,
}

/// Adds a contribution from raw form input.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Rejected input leaves the ledger untouched and returns `ok=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_add(name: String, amount: String, date: String) -> LedgerActionResponse {
    with_store(|store| {
        store
            .add(&name, &amount, &date)
            .map(|record| mutation_response(store, "Contribution added.", Some(&record)))
    })
    .unwrap_or_else(|err| LedgerActionResponse::failure(format!("ledger_add failed: {err}")))
}

/// Replaces the fields of an existing contribution.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Clears the edit reference on success.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_update(id: String, name: String, amount: String, date: String) -> LedgerActionResponse {
    let result = parse_id(&id).and_then(|id| {
        with_store(|store| {
            store
                .update(id, &name, &amount, &date)
                .map(|record| mutation_response(store, "Contribution updated.", Some(&record)))
        })
    });
    result.unwrap_or_else(|err| LedgerActionResponse::failure(format!("ledger_update failed: {err}")))
}

/// Removes a contribution.
///
/// # FFI contract
/// - Never panics.
/// - Removing an unknown or already-removed ID returns `ok=false` and leaves
///   the ledger untouched; callers may treat it as a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_remove(id: String) -> LedgerActionResponse {
    let result = parse_id(&id).and_then(|id| {
        with_store(|store| {
            store
                .remove(id)
                .map(|()| mutation_response(store, "Contribution removed.", None))
        })
    });
    result.unwrap_or_else(|err| LedgerActionResponse::failure(format!("ledger_remove failed: {err}")))
}

/// Lists contributions newest first with the rounded total.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_list() -> LedgerListResponse {
    let result = with_store(|store| {
        let items = store.list().iter().map(to_ledger_entry).collect::<Vec<_>>();
        let message = if items.is_empty() {
            "No contributions.".to_string()
        } else {
            format!("{} contribution(s).", items.len())
        };
        Ok(LedgerListResponse {
            items,
            total: store.total(),
            editing_id: store.editing().map(|record| record.id.to_string()),
            message,
        })
    });

    result.unwrap_or_else(|err| LedgerListResponse {
        items: Vec::new(),
        total: 0.0,
        editing_id: None,
        message: format!("ledger_list failed: {err}"),
    })
}

/// Rounded total of all contributions; `0.0` when the ledger is unavailable.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_total() -> f64 {
    with_store(|store| Ok(store.total())).unwrap_or_else(|err| {
        warn!("event=ffi_total module=ffi status=error error={err}");
        0.0
    })
}

/// Marks a contribution as being edited and returns its values for pre-fill.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_begin_edit(id: String) -> LedgerActionResponse {
    let result = parse_id(&id).and_then(|id| {
        with_store(|store| {
            store.begin_edit(id).map(|record| {
                LedgerActionResponse::success("Editing contribution.", Some(to_ledger_entry(&record)))
            })
        })
    });
    result
        .unwrap_or_else(|err| LedgerActionResponse::failure(format!("ledger_begin_edit failed: {err}")))
}

/// Drops the edit reference without changing any record.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_cancel_edit() -> LedgerActionResponse {
    with_store(|store| {
        store.cancel_edit();
        Ok(LedgerActionResponse::success("Edit cancelled.", None))
    })
    .unwrap_or_else(|err| LedgerActionResponse::failure(format!("ledger_cancel_edit failed: {err}")))
}

fn mutation_response(
    store: &LedgerStore,
    message: &str,
    record: Option<&Contribution>,
) -> LedgerActionResponse {
    let message = if store.last_save_succeeded() {
        message.to_string()
    } else {
        format!("{message} Changes are not saved yet.")
    };
    LedgerActionResponse::success(message, record.map(to_ledger_entry))
}

fn parse_id(raw: &str) -> Result<ContributionId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid contribution id `{}`", raw.trim()))
}

fn resolve_ledger_db_path() -> PathBuf {
    LEDGER_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(LEDGER_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(LEDGER_DB_FILE_NAME)
        })
        .clone()
}

fn lock_ledger() -> MutexGuard<'static, Option<LedgerStore>> {
    // A panic while holding the lock cannot leave the store half-mutated:
    // every mutation completes before saving.
    LEDGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_store<T>(f: impl FnOnce(&mut LedgerStore) -> Result<T, StoreError>) -> Result<T, String> {
    let mut guard = lock_ledger();
    if guard.is_none() {
        let db_path = resolve_ledger_db_path();
        let conn = open_db(&db_path).map_err(|err| format!("ledger DB open failed: {err}"))?;
        *guard = Some(ContributionStore::open(SqliteSnapshotStore::new(conn)));
    }
    match guard.as_mut() {
        Some(store) => f(store).map_err(|err| err.to_string()),
        None => Err("ledger store unavailable".to_string()),
    }
}

fn to_ledger_entry(record: &Contribution) -> LedgerEntry {
    LedgerEntry {
        id: record.id.to_string(),
        name: record.name.clone(),
        amount: record.amount,
        date: record.date.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ledger_add, ledger_begin_edit, ledger_cancel_edit,
        ledger_list, ledger_remove, ledger_total, ledger_update, resolve_ledger_db_path,
        LEDGER_DB_PATH_ENV,
    };
    use std::sync::OnceLock;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    static SCRATCH_DIR: OnceLock<TempDir> = OnceLock::new();

    // Every ledger test calls this first so the process-wide store opens a
    // throwaway database instead of the app's default file.
    fn scratch_ledger() -> &'static TempDir {
        SCRATCH_DIR.get_or_init(|| {
            let dir = tempfile::tempdir().expect("temp dir");
            std::env::set_var(LEDGER_DB_PATH_ENV, dir.path().join("ledger.sqlite3"));
            dir
        })
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/tally-logs".to_string()).is_empty());
    }

    #[test]
    fn add_then_list_contains_entry() {
        scratch_ledger();
        let name = unique_token("ffi-add");
        let added = ledger_add(name.clone(), "12.34".to_string(), "2024-05-01".to_string());
        assert!(added.ok, "{}", added.message);
        let entry = added.entry.expect("add should return the entry");
        assert_eq!(entry.name, name);
        assert_eq!(entry.amount, 12.34);

        let listing = ledger_list();
        assert!(listing.items.iter().any(|item| item.id == entry.id));
        let sum: f64 = listing.items.iter().map(|item| item.amount).sum();
        assert!((listing.total - sum).abs() <= 0.005 + 1e-9);
        assert!(ledger_total() >= 0.0);
    }

    #[test]
    fn add_rejects_blank_name() {
        scratch_ledger();
        let response = ledger_add("  ".to_string(), "1".to_string(), "2024-05-01".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("name"));
    }

    #[test]
    fn edit_flow_updates_and_clears_reference() {
        scratch_ledger();
        let name = unique_token("ffi-edit");
        let added = ledger_add(name, "5".to_string(), "2024-05-02".to_string());
        let id = added.entry.expect("entry").id;

        let prefill = ledger_begin_edit(id.clone());
        assert!(prefill.ok, "{}", prefill.message);
        assert_eq!(prefill.entry.map(|entry| entry.amount), Some(5.0));

        let updated = ledger_update(
            id.clone(),
            unique_token("ffi-edited"),
            "7.5".to_string(),
            "2024-05-03".to_string(),
        );
        assert!(updated.ok, "{}", updated.message);
        let entry = updated.entry.expect("entry");
        assert_eq!(entry.id, id);
        assert_eq!(entry.amount, 7.5);
        assert_eq!(entry.date, "2024-05-03");

        assert!(ledger_cancel_edit().ok);
    }

    #[test]
    fn remove_twice_is_tolerated() {
        scratch_ledger();
        let added = ledger_add(unique_token("ffi-remove"), "1".to_string(), "2024-05-04".to_string());
        let id = added.entry.expect("entry").id;

        assert!(ledger_remove(id.clone()).ok);
        let second = ledger_remove(id.clone());
        assert!(!second.ok);
        assert!(second.message.contains("not found"));
        assert!(ledger_list().items.iter().all(|item| item.id != id));
    }

    #[test]
    fn malformed_id_is_rejected() {
        scratch_ledger();
        let response = ledger_remove("not-a-uuid".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid contribution id"));
    }

    #[test]
    fn db_path_comes_from_environment() {
        let dir = scratch_ledger();
        assert!(resolve_ledger_db_path().starts_with(dir.path()));
    }
}
