//! Relational tier on `SQLite`.
//!
//! Records and list entries are stored as JSON blobs so the schema stays
//! stable as the value types evolve:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS kv_records (
//!     key        TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! CREATE TABLE IF NOT EXISTS list_entries (
//!     seq        INTEGER PRIMARY KEY AUTOINCREMENT,
//!     key        TEXT NOT NULL,
//!     data       BLOB NOT NULL,
//!     created_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! Lists are never trimmed here: this tier keeps the full history even
//! though the in-process view is capped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use super::{Tier, TierError, TierResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv_records (
        key        TEXT PRIMARY KEY,
        data       BLOB NOT NULL,
        updated_at TEXT NOT NULL,
        checksum   TEXT
    );
    CREATE TABLE IF NOT EXISTS list_entries (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        key        TEXT NOT NULL,
        data       BLOB NOT NULL,
        created_at TEXT NOT NULL,
        checksum   TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_list_entries_key_seq ON list_entries(key, seq);
";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 (ISO 3309) of `data` as lowercase hex.
fn crc32_hex(data: &[u8]) -> String {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    format!("{:08x}", !crc)
}

// ---------------------------------------------------------------------------
// SqliteTier
// ---------------------------------------------------------------------------

/// Handle to the relational store.
///
/// ```no_run
/// # use mindvault_core::tier::{SqliteTier, Tier};
/// # async fn demo() -> Result<(), mindvault_core::tier::TierError> {
/// let tier = SqliteTier::open("world_minds.db", true, true)?;
/// tier.put("profile:7", br#"{"backstory":"..."}"#).await?;
/// let back = tier.get("profile:7").await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteTier {
    conn: Arc<Mutex<Connection>>,
    checksum_enabled: bool,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTier")
            .field("db_path", &self.db_path)
            .field("checksum_enabled", &self.checksum_enabled)
            .finish_non_exhaustive()
    }
}

impl SqliteTier {
    /// Open (or create) a database at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`super::TierError::Database`] on `SQLite` failures.
    pub fn open<P: AsRef<Path>>(path: P, wal_mode: bool, checksum_enabled: bool) -> TierResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = wal_mode, "Relational tier opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            checksum_enabled,
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`super::TierError::Database`] on `SQLite` failures.
    pub fn open_in_memory() -> TierResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            checksum_enabled: true,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of list entries stored under `key` (full history).
    ///
    /// # Errors
    ///
    /// Returns [`super::TierError::Database`] on `SQLite` failures.
    pub fn list_len(&self, key: &str) -> TierResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM list_entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Copy the database to `dest_path` with `SQLite`'s online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`super::TierError::Database`] on `SQLite` failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> TierResult<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let conn = self.conn.lock();
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Relational tier backup completed"
        );
        Ok(())
    }

    /// Run `PRAGMA integrity_check`; `Ok(false)` means corruption.
    ///
    /// # Errors
    ///
    /// Returns [`super::TierError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> TierResult<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Run `f` against the connection on tokio's blocking pool so tier
    /// calls never stall a runtime worker.
    async fn blocking<T, F>(&self, f: F) -> TierResult<T>
    where
        F: FnOnce(&Connection) -> TierResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| TierError::Unavailable(format!("sqlite task failed: {e}")))?
    }

    fn checksum(&self, data: &[u8]) -> Option<String> {
        self.checksum_enabled.then(|| crc32_hex(data))
    }

    fn verify(&self, key: &str, data: &[u8], stored: Option<&str>) {
        if !self.checksum_enabled {
            return;
        }
        if let Some(expected) = stored {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(key, expected, actual = %actual, "Checksum mismatch, possible corruption");
            }
        }
    }
}

#[async_trait]
impl Tier for SqliteTier {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn probe(&self) -> TierResult<()> {
        self.blocking(|conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>> {
        let owned = key.to_string();
        let row: Option<(Vec<u8>, Option<String>)> = self
            .blocking(move |conn| {
                Ok(conn
                    .prepare_cached("SELECT data, checksum FROM kv_records WHERE key = ?1")?
                    .query_row(params![owned], |row| Ok((row.get(0)?, row.get(1)?)))
                    .optional()?)
            })
            .await?;

        let Some((data, checksum)) = row else {
            return Ok(None);
        };
        self.verify(key, &data, checksum.as_deref());
        Ok(Some(data))
    }

    async fn put(&self, key: &str, value: &[u8]) -> TierResult<()> {
        let (owned, data, checksum) = (key.to_string(), value.to_vec(), self.checksum(value));
        let now = Utc::now().to_rfc3339();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO kv_records (key, data, updated_at, checksum)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at,
                    checksum = excluded.checksum",
                params![owned, data, now, checksum],
            )?;
            Ok(())
        })
        .await?;
        debug!(key, bytes = value.len(), "Record stored");
        Ok(())
    }

    async fn push(&self, key: &str, value: &[u8]) -> TierResult<()> {
        let (owned, data, checksum) = (key.to_string(), value.to_vec(), self.checksum(value));
        let now = Utc::now().to_rfc3339();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO list_entries (key, data, created_at, checksum) VALUES (?1, ?2, ?3, ?4)",
                params![owned, data, now, checksum],
            )?;
            Ok(())
        })
        .await?;
        debug!(key, bytes = value.len(), "List entry appended");
        Ok(())
    }

    async fn range(&self, key: &str, count: usize) -> TierResult<Vec<Vec<u8>>> {
        let owned = key.to_string();
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let rows: Vec<(Vec<u8>, Option<String>)> = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT data, checksum FROM list_entries WHERE key = ?1 ORDER BY seq DESC LIMIT ?2",
                )?;
                let mapped =
                    stmt.query_map(params![owned, limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(mapped.collect::<Result<_, _>>()?)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(data, checksum)| {
                self.verify(key, &data, checksum.as_deref());
                data
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_round_trip_and_upsert() {
        let tier = SqliteTier::open_in_memory().expect("open");
        assert!(tier.get("profile:1").await.expect("get").is_none());
        tier.put("profile:1", b"first").await.expect("put");
        tier.put("profile:1", b"second").await.expect("put");
        assert_eq!(tier.get("profile:1").await.expect("get"), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn lists_keep_full_history_newest_first() {
        let tier = SqliteTier::open_in_memory().expect("open");
        for i in 0..150u8 {
            tier.push("memories:1", &[i]).await.expect("push");
        }
        tier.push("memories:2", b"other").await.expect("push");

        assert_eq!(tier.list_len("memories:1").expect("len"), 150);
        let newest = tier.range("memories:1", 3).await.expect("range");
        assert_eq!(newest, vec![vec![149], vec![148], vec![147]]);
        assert!(tier.range("memories:3", 3).await.expect("range").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_tasks_share_the_connection() {
        let tier = Arc::new(SqliteTier::open_in_memory().expect("open"));
        let mut handles = Vec::new();
        for agent in 0..8u8 {
            let tier = Arc::clone(&tier);
            handles.push(tokio::spawn(async move {
                let key = format!("memories:{agent}");
                for i in 0..25u8 {
                    tier.push(&key, &[i]).await.expect("push");
                }
                tier.range(&key, 1).await.expect("range")
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join"), vec![vec![24]]);
        }
        assert_eq!(tier.list_len("memories:3").expect("len"), 25);
    }

    #[tokio::test]
    async fn probe_and_integrity_pass() {
        let tier = SqliteTier::open_in_memory().expect("open");
        tier.probe().await.expect("probe");
        assert!(tier.integrity_check().expect("check"));
    }

    #[tokio::test]
    async fn checksum_mismatch_still_returns_data() {
        let tier = SqliteTier::open_in_memory().expect("open");
        tier.put("k", b"payload").await.expect("put");
        tier.conn
            .lock()
            .execute("UPDATE kv_records SET checksum = 'deadbeef' WHERE key = 'k'", [])
            .expect("corrupt checksum");
        assert_eq!(tier.get("k").await.expect("get"), Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn file_backed_survives_reopen_and_backs_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("minds.db");
        {
            let tier = SqliteTier::open(&path, true, true).expect("open");
            tier.put("profile:9", b"kept").await.expect("put");
            tier.backup(dir.path().join("minds_backup.db")).expect("backup");
        }
        let reopened = SqliteTier::open(&path, true, true).expect("reopen");
        assert_eq!(reopened.get("profile:9").await.expect("get"), Some(b"kept".to_vec()));

        let backup = SqliteTier::open(dir.path().join("minds_backup.db"), false, true).expect("open backup");
        assert_eq!(backup.get("profile:9").await.expect("get"), Some(b"kept".to_vec()));
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_hex(b"123456789"), "cbf43926");
    }
}
