//! Byte-level key/value persistence.
//!
//! The engine core never touches this module directly; the catalog does.
//! Storage is a single SQLite table acting as an ordered key/value store:
//! `get`, `set`, and prefix listing are the whole contract. Values are
//! opaque byte blobs; what goes into them is the catalog's business.
//!
//! A background task writes a periodic full backup of the database to a
//! sibling `<path>.backup` file (default: every 20 minutes).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error, info};
use rusqlite::{Connection, OptionalExtension};

/// Default interval between full backups.
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// How many times transient (busy/locked) errors are retried.
const TRANSIENT_RETRIES: u32 = 3;

struct BackupTask {
    cancel_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// SQLite-backed key/value store.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
    backup: Mutex<Option<BackupTask>>,
}

impl Store {
    /// Opens (or creates) the database at `path` and prepares the kv table.
    ///
    /// # Errors
    ///
    /// Fails on an empty path or when SQLite cannot open or migrate the
    /// file.
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            bail!("database path must not be empty");
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .context("failed to create kv table")?;

        info!("store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            backup: Mutex::new(None),
        })
    }

    /// Reads the value stored under `key`. Missing keys are `None`, not an
    /// error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_retry(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
        })
        .with_context(|| format!("failed to read key {key:?}"))
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )
            .map(|_| ())
        })
        .with_context(|| format!("failed to write key {key:?}"))
    }

    /// Lists every `(key, value)` pair whose key starts with `prefix`, in
    /// key order. The key schema uses no SQL wildcard characters, so a
    /// plain LIKE prefix match is sufficient.
    pub fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.with_retry(|conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM kv WHERE key LIKE ?1 || '%' ORDER BY key")?;
            let rows = stmt.query_map([prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .with_context(|| format!("failed to list keys with prefix {prefix:?}"))
    }

    /// Starts the periodic backup task. Calling it again replaces the
    /// previous schedule.
    pub fn start_backup(self: &Arc<Self>, interval: Duration) {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let weak = Arc::downgrade(self);
        let handle = thread::spawn(move || backup_loop(&weak, &cancel_rx, interval));

        let mut slot = self.backup.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(BackupTask { cancel_tx, handle }) {
            drop(previous.cancel_tx);
            let _ = previous.handle.join();
        }
    }

    /// Writes a full backup to `<path>.backup` immediately.
    pub fn backup_now(&self) -> Result<()> {
        let target = backup_path(&self.path);
        // VACUUM INTO refuses to overwrite; a stale backup is replaced.
        let _ = std::fs::remove_file(&target);

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute("VACUUM INTO ?1", [target.to_string_lossy().as_ref()])
            .with_context(|| format!("failed to back up database to {}", target.display()))?;
        debug!("database backed up to {}", target.display());
        Ok(())
    }

    /// Stops the backup task. The database file itself needs no explicit
    /// close. Idempotent.
    pub fn close(&self) {
        let task = self
            .backup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            drop(task.cancel_tx);
            let _ = task.handle.join();
        }
    }

    fn with_retry<T>(&self, op: impl Fn(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut attempt = 1;
        loop {
            match op(&conn) {
                Err(err) if is_transient(&err) && attempt < TRANSIENT_RETRIES => {
                    debug!("transient database error (attempt {attempt}): {err}");
                    attempt += 1;
                    thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                }
                result => return result,
            }
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

fn backup_loop(store: &Weak<Store>, cancel: &Receiver<()>, interval: Duration) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(ticker) -> _ => {
                let Some(store) = store.upgrade() else { return };
                if let Err(err) = store.backup_now() {
                    error!("periodic backup failed: {err:#}");
                }
            }
        }
    }
}
