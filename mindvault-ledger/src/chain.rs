//! `SQLite`-backed hash-chained ledger.
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS ledger_entries (
//!     seq          INTEGER PRIMARY KEY,
//!     agent_id     INTEGER NOT NULL,
//!     entry_kind   TEXT NOT NULL,
//!     memory_id    INTEGER,
//!     payload      BLOB NOT NULL,
//!     prev_hash    TEXT NOT NULL,
//!     hash         TEXT NOT NULL,
//!     committed_at TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS controllers (
//!     agent_id   INTEGER NOT NULL,
//!     controller TEXT NOT NULL,
//!     PRIMARY KEY (agent_id, controller)
//! );
//! ```
//!
//! Rows are only ever inserted. Writes need a controller granted for the
//! entry's agent; reads are open to anyone.
//!
//! The async [`AuthoritativeLedger`] methods run on tokio's blocking pool.
//! The inherent methods are synchronous and meant for setup and audits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mindvault_core::ledger::{
    AuthoritativeLedger, LedgerEntry, LedgerError, LedgerReceipt, LedgerResult,
};
use mindvault_core::types::{Address, AgentId};

use crate::hash::{GENESIS_HASH, link_hash};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ledger_entries (
        seq          INTEGER PRIMARY KEY,
        agent_id     INTEGER NOT NULL,
        entry_kind   TEXT NOT NULL,
        memory_id    INTEGER,
        payload      BLOB NOT NULL,
        prev_hash    TEXT NOT NULL,
        hash         TEXT NOT NULL,
        committed_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_memory
        ON ledger_entries(agent_id, memory_id) WHERE entry_kind = 'memory';
    CREATE INDEX IF NOT EXISTS idx_ledger_agent ON ledger_entries(agent_id, seq);
    CREATE TABLE IF NOT EXISTS controllers (
        agent_id   INTEGER NOT NULL,
        controller TEXT NOT NULL,
        PRIMARY KEY (agent_id, controller)
    );
";

/// Result of walking the whole chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainStatus {
    /// Every link recomputes correctly.
    Intact {
        /// Number of entries checked.
        entries: u64,
    },
    /// The first entry whose link does not match.
    Broken {
        /// Sequence number of that entry.
        sequence: u64,
    },
}

impl ChainStatus {
    /// Whether the chain verified.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact { .. })
    }
}

/// Append-only ledger whose entries are linked by SHA-256 hashes.
pub struct HashChainLedger {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl std::fmt::Debug for HashChainLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChainLedger")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

fn storage(e: rusqlite::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

// SQLite integers are signed; ids are stored bit-for-bit.
fn to_sql_id(id: u64) -> i64 {
    i64::from_ne_bytes(id.to_ne_bytes())
}

fn from_sql_id(id: i64) -> u64 {
    u64::from_ne_bytes(id.to_ne_bytes())
}

impl HashChainLedger {
    /// Open (or create) a ledger database at `path`.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] if the database cannot be opened or the
    /// schema cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(storage)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        info!(path = %db_path.display(), "Ledger opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// An in-memory ledger (useful for tests).
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Database location.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Give `controller` the right to commit entries for `agent`.
    /// Granting twice is harmless.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn grant_controller(&self, agent: AgentId, controller: Address) -> LedgerResult<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR IGNORE INTO controllers (agent_id, controller) VALUES (?1, ?2)",
                params![to_sql_id(agent.0), controller.to_string()],
            )
            .map_err(storage)?;
        info!(agent = %agent, controller = %controller, "Controller granted");
        Ok(())
    }

    /// Whether `controller` may commit entries for `agent`.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn is_controller(&self, agent: AgentId, controller: Address) -> LedgerResult<bool> {
        Self::check_controller(&self.conn.lock(), agent, controller)
    }

    fn check_controller(conn: &Connection, agent: AgentId, controller: Address) -> LedgerResult<bool> {
        conn.query_row(
            "SELECT 1 FROM controllers WHERE agent_id = ?1 AND controller = ?2",
            params![to_sql_id(agent.0), controller.to_string()],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(storage)
    }

    /// Number of committed entries across all agents.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn len(&self) -> LedgerResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))
            .map_err(storage)?;
        Ok(from_sql_id(count))
    }

    /// Whether nothing has been committed.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Receipt of the newest entry, if any.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures.
    pub fn head(&self) -> LedgerResult<Option<LedgerReceipt>> {
        Self::head_of(&self.conn.lock())
    }

    fn head_of(conn: &Connection) -> LedgerResult<Option<LedgerReceipt>> {
        conn.query_row(
            "SELECT seq, hash FROM ledger_entries ORDER BY seq DESC LIMIT 1",
            [],
            |row| {
                Ok(LedgerReceipt {
                    sequence: from_sql_id(row.get(0)?),
                    hash: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(storage)
    }

    /// Recompute every link from genesis.
    ///
    /// # Errors
    /// [`LedgerError::Storage`] on `SQLite` failures. A broken chain is
    /// reported as [`ChainStatus::Broken`], not as an error.
    pub fn verify_chain(&self) -> LedgerResult<ChainStatus> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT seq, payload, prev_hash, hash FROM ledger_entries ORDER BY seq")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    from_sql_id(row.get(0)?),
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(storage)?;

        let mut expected_prev = GENESIS_HASH.to_string();
        let mut expected_seq = 1u64;
        for row in rows {
            let (seq, payload, prev_hash, hash) = row.map_err(storage)?;
            if seq != expected_seq
                || prev_hash != expected_prev
                || hash != link_hash(&prev_hash, seq, &payload)
            {
                warn!(sequence = seq, "Ledger chain broken");
                return Ok(ChainStatus::Broken {
                    sequence: expected_seq.min(seq),
                });
            }
            expected_prev = hash;
            expected_seq += 1;
        }
        Ok(ChainStatus::Intact {
            entries: expected_seq - 1,
        })
    }

    /// Receipt and stored payload of a memory already on the ledger.
    fn existing_memory(
        conn: &Connection,
        agent: AgentId,
        memory_id: u64,
    ) -> LedgerResult<Option<(LedgerReceipt, Vec<u8>)>> {
        conn.query_row(
            "SELECT seq, hash, payload FROM ledger_entries
             WHERE agent_id = ?1 AND entry_kind = 'memory' AND memory_id = ?2",
            params![to_sql_id(agent.0), to_sql_id(memory_id)],
            |row| {
                let receipt = LedgerReceipt {
                    sequence: from_sql_id(row.get(0)?),
                    hash: row.get(1)?,
                };
                Ok((receipt, row.get(2)?))
            },
        )
        .optional()
        .map_err(storage)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut Connection) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&mut conn.lock()))
            .await
            .map_err(|e| LedgerError::Unavailable(format!("ledger task failed: {e}")))?
    }

    fn append(
        conn: &mut Connection,
        controller: Address,
        entry: &LedgerEntry,
    ) -> LedgerResult<LedgerReceipt> {
        let agent = entry.agent();
        let memory_id = match entry {
            LedgerEntry::Memory(m) => Some(m.memory_id),
            LedgerEntry::ProfileSnapshot(_) => None,
        };
        let payload =
            serde_json::to_vec(entry).map_err(|e| LedgerError::Serialization(e.to_string()))?;

        if !Self::check_controller(conn, agent, controller)? {
            return Err(LedgerError::Unauthorized { agent, controller });
        }
        if let Some(id) = memory_id {
            if let Some((receipt, stored)) = Self::existing_memory(conn, agent, id)? {
                if stored != payload {
                    warn!(agent = %agent, memory_id = id, sequence = receipt.sequence, "Memory id reused with different content");
                    return Err(LedgerError::Conflict {
                        agent,
                        memory_id: id,
                    });
                }
                debug!(agent = %agent, memory_id = id, sequence = receipt.sequence, "Memory already on ledger");
                return Ok(receipt);
            }
        }

        let tx = conn.transaction().map_err(storage)?;
        let (prev_seq, prev_hash) = Self::head_of(&tx)?
            .map_or((0, GENESIS_HASH.to_string()), |r| (r.sequence, r.hash));
        let sequence = prev_seq + 1;
        let hash = link_hash(&prev_hash, sequence, &payload);
        tx.execute(
            "INSERT INTO ledger_entries
                 (seq, agent_id, entry_kind, memory_id, payload, prev_hash, hash, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                to_sql_id(sequence),
                to_sql_id(agent.0),
                entry.kind_name(),
                memory_id.map(to_sql_id),
                payload,
                prev_hash,
                hash,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;

        debug!(agent = %agent, kind = entry.kind_name(), sequence, "Ledger entry committed");
        Ok(LedgerReceipt { sequence, hash })
    }

    fn read_entries(conn: &Connection, agent: AgentId) -> LedgerResult<Vec<LedgerEntry>> {
        let mut stmt = conn
            .prepare("SELECT payload FROM ledger_entries WHERE agent_id = ?1 ORDER BY seq")
            .map_err(storage)?;
        let payloads = stmt
            .query_map(params![to_sql_id(agent.0)], |row| row.get::<_, Vec<u8>>(0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        payloads
            .iter()
            .map(|p| {
                serde_json::from_slice(p).map_err(|e| LedgerError::Serialization(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl AuthoritativeLedger for HashChainLedger {
    async fn commit(&self, controller: Address, entry: LedgerEntry) -> LedgerResult<LedgerReceipt> {
        self.blocking(move |conn| Self::append(conn, controller, &entry))
            .await
    }

    async fn entries(&self, agent: AgentId) -> LedgerResult<Vec<LedgerEntry>> {
        self.blocking(move |conn| Self::read_entries(conn, agent))
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mindvault_core::ledger::{PromotedMemory, ProfileSnapshot};
    use mindvault_core::memory::MemoryDraft;
    use mindvault_core::personality::{PersonalityProfile, archetype_traits};
    use mindvault_core::types::MemoryKind;

    use super::*;

    const OWNER: Address = Address([0xaa; 20]);

    fn ledger() -> HashChainLedger {
        let ledger = HashChainLedger::open_in_memory().expect("ledger");
        ledger.grant_controller(AgentId(1), OWNER).expect("grant");
        ledger
    }

    fn memory(id: u64) -> LedgerEntry {
        let record = MemoryDraft::new(MemoryKind::Achievement, format!("deed {id}"))
            .with_significance(90)
            .into_record(id, Utc::now())
            .expect("valid");
        LedgerEntry::Memory(PromotedMemory::from_record(AgentId(1), &record))
    }

    fn snapshot() -> LedgerEntry {
        let profile = PersonalityProfile::new(AgentId(1), archetype_traits("scholar"), "Sage.", vec![])
            .expect("valid");
        LedgerEntry::ProfileSnapshot(ProfileSnapshot::from(&profile))
    }

    #[tokio::test]
    async fn sequences_link_from_genesis() {
        let l = ledger();
        let first = l.commit(OWNER, snapshot()).await.expect("commit");
        let second = l.commit(OWNER, memory(0)).await.expect("commit");
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(first.hash.len(), 64);
        assert_ne!(first.hash, second.hash);
        assert_eq!(l.head().expect("head"), Some(second));
        assert_eq!(l.verify_chain().expect("verify"), ChainStatus::Intact { entries: 2 });
    }

    #[tokio::test]
    async fn unauthorized_controller_rejected() {
        let l = ledger();
        let stranger = Address::from_low_u64(0xbad);
        let err = l.commit(stranger, memory(0)).await.expect_err("unauthorized");
        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        assert!(l.is_empty().expect("len"));
        assert!(!l.is_controller(AgentId(1), stranger).expect("check"));
        assert!(l.is_controller(AgentId(1), OWNER).expect("check"));
    }

    #[tokio::test]
    async fn memory_commits_are_idempotent() {
        let l = ledger();
        let entry = memory(5);
        let a = l.commit(OWNER, entry.clone()).await.expect("commit");
        let b = l.commit(OWNER, entry).await.expect("recommit");
        assert_eq!(a, b);
        assert_eq!(l.len().expect("len"), 1);

        // Snapshots are not deduplicated.
        l.commit(OWNER, snapshot()).await.expect("commit");
        l.commit(OWNER, snapshot()).await.expect("commit");
        assert_eq!(l.len().expect("len"), 3);
    }

    #[tokio::test]
    async fn reused_memory_id_with_new_content_conflicts() {
        let l = ledger();
        let original = l.commit(OWNER, memory(4)).await.expect("commit");

        let record = MemoryDraft::new(MemoryKind::Achievement, "a different deed")
            .with_significance(95)
            .into_record(4, Utc::now())
            .expect("valid");
        let imposter = LedgerEntry::Memory(PromotedMemory::from_record(AgentId(1), &record));
        let err = l.commit(OWNER, imposter).await.expect_err("conflict");
        assert!(matches!(
            err,
            LedgerError::Conflict {
                agent: AgentId(1),
                memory_id: 4
            }
        ));

        assert_eq!(l.len().expect("len"), 1);
        assert_eq!(l.head().expect("head"), Some(original));
        let entries = l.entries(AgentId(1)).await.expect("entries");
        assert!(matches!(&entries[0], LedgerEntry::Memory(m) if m.content == "deed 4"));
    }

    #[tokio::test]
    async fn entries_are_open_and_ordered() {
        let l = ledger();
        l.commit(OWNER, memory(1)).await.expect("commit");
        l.commit(OWNER, memory(2)).await.expect("commit");
        let entries = l.entries(AgentId(1)).await.expect("entries");
        let ids: Vec<u64> = entries
            .iter()
            .filter_map(|e| match e {
                LedgerEntry::Memory(m) => Some(m.memory_id),
                LedgerEntry::ProfileSnapshot(_) => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(l.entries(AgentId(99)).await.expect("entries").is_empty());
    }

    #[test]
    fn sql_id_round_trips_full_range() {
        for id in [0, 1, u64::MAX, u64::MAX / 2 + 1] {
            assert_eq!(from_sql_id(to_sql_id(id)), id);
        }
    }
}
