//! Integration tests: end-to-end flows through `MindStore`.
//!
//! Covers tier fallback and backfill, fault injection with an offline
//! cache, restart and hydration from `SQLite` files, write-behind flushing,
//! promotion to a recording ledger, and concurrent agents.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mindvault_core::briefing::NEUTRAL_BRIEFING;
use mindvault_core::config::MindConfig;
use mindvault_core::ledger::{
    AuthoritativeLedger, LedgerEntry, LedgerError, LedgerReceipt, LedgerResult,
};
use mindvault_core::memory::{LOG_CAPACITY, MemoryDraft};
use mindvault_core::tier::{CacheTier, SqliteTier, StoreKey, Tier};
use mindvault_core::{
    Address, AgentId, MemoryKind, MindError, MindStore, Polarity, RelationshipLabel, TraitKind,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Ledger double that records commits and can be switched to reject them.
#[derive(Default)]
struct RecordingLedger {
    entries: Mutex<Vec<(Address, LedgerEntry)>>,
    reject: Mutex<bool>,
}

impl RecordingLedger {
    fn memory_ids(&self) -> Vec<u64> {
        self.entries
            .lock()
            .iter()
            .filter_map(|(_, e)| match e {
                LedgerEntry::Memory(m) => Some(m.memory_id),
                LedgerEntry::ProfileSnapshot(_) => None,
            })
            .collect()
    }

    fn snapshots(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(_, e)| matches!(e, LedgerEntry::ProfileSnapshot(_)))
            .count()
    }
}

#[async_trait]
impl AuthoritativeLedger for RecordingLedger {
    async fn commit(&self, controller: Address, entry: LedgerEntry) -> LedgerResult<LedgerReceipt> {
        if *self.reject.lock() {
            return Err(LedgerError::Unavailable("ledger down".into()));
        }
        let mut entries = self.entries.lock();
        entries.push((controller, entry));
        Ok(LedgerReceipt {
            sequence: entries.len() as u64,
            hash: String::new(),
        })
    }

    async fn entries(&self, agent: AgentId) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(_, e)| e.agent() == agent)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

/// Config for stores built with explicit tiers; writes go inline.
fn inline_config() -> MindConfig {
    let mut config = MindConfig::default();
    config.tiers.write_behind = false;
    config.tiers.reprobe_interval_ms = 0;
    config
}

fn sqlite_config(dir: &tempfile::TempDir) -> MindConfig {
    let mut config = MindConfig::default();
    config.tiers.cache_enabled = false;
    config.tiers.sqlite_path = dir.path().join("mind.db");
    config
}

fn event(content: &str, significance: i64) -> MemoryDraft {
    MemoryDraft::new(MemoryKind::Event, content).with_significance(significance)
}

// ---------------------------------------------------------------------------
// Tier chain behaviour through the facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn durable_read_backfills_cache() {
    let sqlite = Arc::new(SqliteTier::open_in_memory().expect("sqlite"));
    let writer_cache = CacheTier::new(64, 100);
    let store = MindStore::with_tiers(
        inline_config(),
        vec![Arc::new(writer_cache), sqlite.clone()],
        None,
    )
    .await;
    store
        .initialize_from_archetype(AgentId(1), "merchant", "Sells rope.", vec!["haggles".into()])
        .await
        .expect("init");

    // A second process: cold cache, same relational store.
    let cold_cache = CacheTier::new(64, 100);
    let other = MindStore::with_tiers(
        inline_config(),
        vec![Arc::new(cold_cache.clone()), sqlite],
        None,
    )
    .await;
    let key = StoreKey::Profile(AgentId(1)).to_string();
    assert!(cold_cache.get(&key).await.expect("get").is_none());

    let profile = other.get_profile(AgentId(1)).await.expect("profile");
    assert_eq!(profile.quirks, vec!["haggles".to_string()]);
    assert!(cold_cache.get(&key).await.expect("get").is_some());
}

#[tokio::test]
async fn offline_cache_never_fails_operations() {
    let cache = CacheTier::new(64, 100);
    let sqlite = Arc::new(SqliteTier::open_in_memory().expect("sqlite"));
    cache.set_online(false);
    let mut config = inline_config();
    config.tiers.reprobe_interval_ms = 60_000;
    let store = MindStore::with_tiers(config, vec![Arc::new(cache.clone()), sqlite.clone()], None).await;
    assert_eq!(store.available_tiers(), vec!["sqlite".to_string()]);

    let agent = AgentId(2);
    store
        .initialize_from_archetype(agent, "warrior", "Veteran.", vec![])
        .await
        .expect("init despite offline cache");
    store.append_memory(agent, event("battle", 40)).await.expect("append");

    assert_eq!(
        sqlite.list_len(&StoreKey::Memories(agent).to_string()).expect("len"),
        1
    );
    cache.set_online(true);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn recovered_tier_is_used_again() {
    let cache = CacheTier::new(64, 100);
    let store = MindStore::with_tiers(inline_config(), vec![Arc::new(cache.clone())], None).await;

    cache.set_online(false);
    store
        .record_interaction(AgentId(3), Address::from_low_u64(9), 10)
        .await
        .expect("rel");
    assert!(store.available_tiers().is_empty());

    cache.set_online(true);
    store
        .record_interaction(AgentId(3), Address::from_low_u64(9), 10)
        .await
        .expect("rel");
    assert_eq!(store.available_tiers(), vec!["cache".to_string()]);
    let key = StoreKey::Relationship(AgentId(3), Address::from_low_u64(9)).to_string();
    assert!(cache.get(&key).await.expect("get").is_some());
}

#[tokio::test]
async fn unopenable_sqlite_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = sqlite_config(&dir);
    config.tiers.sqlite_path = dir.path().join("missing").join("nested").join("mind.db");
    let store = MindStore::open(config, None).await;
    assert!(store.available_tiers().is_empty());
    store
        .append_memory(AgentId(4), event("still works", 10))
        .await
        .expect("append");
    assert_eq!(store.recent_memories(AgentId(4), 5).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Restart and hydration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = AgentId(7);
    let friend = Address::from_low_u64(0xf00d);

    {
        let store = MindStore::open(sqlite_config(&dir), None).await;
        store
            .initialize_from_archetype(agent, "scholar", "Keeps the archive.", vec![])
            .await
            .expect("init");
        for i in 0..130 {
            store.append_memory(agent, event(&format!("page {i}"), 5)).await.expect("append");
        }
        store.record_interaction(agent, friend, 75).await.expect("rel");
        store.shutdown().await;
    }

    let store = MindStore::open(sqlite_config(&dir), None).await;
    let profile = store.get_profile(agent).await.expect("profile survives");
    assert_eq!(profile.backstory, "Keeps the archive.");
    assert!(matches!(
        store
            .initialize_from_archetype(agent, "warrior", "Imposter.", vec![])
            .await,
        Err(MindError::AlreadyInitialized(_))
    ));

    let recent = store.recent_memories(agent, 500).await;
    assert_eq!(recent.len(), LOG_CAPACITY);
    assert_eq!(recent[0].content, "page 129");

    let next = store.append_memory(agent, event("page 130", 5)).await.expect("append");
    assert_eq!(next.id, 130);

    let rel = store.get_relationship(agent, friend).await.expect("rel survives");
    assert_eq!(rel.affinity(), 75);
    assert_eq!(rel.label(), RelationshipLabel::Friend);
}

#[tokio::test]
async fn durable_tier_keeps_full_history() {
    let sqlite = Arc::new(SqliteTier::open_in_memory().expect("sqlite"));
    let store = MindStore::with_tiers(inline_config(), vec![sqlite.clone()], None).await;
    for i in 0..150 {
        store.append_memory(AgentId(1), event(&format!("e{i}"), 1)).await.expect("append");
    }
    assert_eq!(store.recent_memories(AgentId(1), 1000).await.len(), LOG_CAPACITY);
    assert_eq!(
        sqlite.list_len(&StoreKey::Memories(AgentId(1)).to_string()).expect("len"),
        150
    );
}

#[tokio::test]
async fn evicted_agent_rehydrates_from_tiers() {
    let store = MindStore::with_tiers(inline_config(), vec![Arc::new(CacheTier::new(64, 100))], None).await;
    let agent = AgentId(11);
    store.initialize_from_archetype(agent, "trickster", "Jester.", vec![]).await.expect("init");
    store.append_memory(agent, event("joke", 10)).await.expect("append");
    store.update_trait(agent, TraitKind::Humor, 100).await.expect("update");

    assert!(store.evict(agent));
    let profile = store.get_profile(agent).await.expect("rehydrated");
    assert_eq!(profile.traits.get(TraitKind::Humor), 100);
    assert_eq!(store.recent_memories(agent, 10).await[0].content, "joke");
}

#[tokio::test]
async fn restart_during_outage_settles_once_tier_returns() {
    let cache = CacheTier::new(64, 100);
    let ledger = Arc::new(RecordingLedger::default());
    let mut config = inline_config();
    config.promotion.controller = Address::from_low_u64(0xc0);
    let agent = AgentId(21);
    let rival = Address::from_low_u64(0xbeef);

    {
        let store =
            MindStore::with_tiers(config.clone(), vec![Arc::new(cache.clone())], Some(ledger.clone())).await;
        store
            .initialize_from_archetype(agent, "warrior", "Original.", vec![])
            .await
            .expect("init");
        store.append_memory(agent, event("slew dragon", 90)).await.expect("append");
        store.record_interaction(agent, rival, -40).await.expect("rel");
        store.shutdown().await;
    }

    // The next process starts while its only tier is down.
    cache.set_online(false);
    let store = MindStore::with_tiers(config, vec![Arc::new(cache.clone())], Some(ledger.clone())).await;
    assert!(store.available_tiers().is_empty());

    let crowned = store.append_memory(agent, event("crowned king", 95)).await.expect("append");
    assert_ne!(crowned.id, 0);
    store
        .initialize_from_archetype(agent, "merchant", "Imposter.", vec![])
        .await
        .expect("kept in process while unsettled");
    store.record_interaction(agent, rival, -40).await.expect("rel");

    cache.set_online(true);
    let profile = store.get_profile(agent).await.expect("profile");
    assert_eq!(profile.backstory, "Original.");
    assert!(matches!(
        store
            .initialize_from_archetype(agent, "scholar", "Third.", vec![])
            .await,
        Err(MindError::AlreadyInitialized(_))
    ));

    let recent: Vec<String> = store
        .recent_memories(agent, 10)
        .await
        .into_iter()
        .map(|r| r.content)
        .collect();
    assert_eq!(recent, vec!["crowned king", "slew dragon"]);
    let key = StoreKey::Memories(agent).to_string();
    assert_eq!(cache.range(&key, 10).await.expect("range").len(), 2);

    let rel = store.get_relationship(agent, rival).await.expect("rel");
    assert_eq!((rel.affinity(), rel.interaction_count()), (-80, 2));

    store.shutdown().await;
    let ids = ledger.memory_ids();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(ledger.snapshots(), 1);
}

// ---------------------------------------------------------------------------
// Write-behind
// ---------------------------------------------------------------------------

#[tokio::test]
async fn write_behind_flushes_on_shutdown() {
    let sqlite = Arc::new(SqliteTier::open_in_memory().expect("sqlite"));
    let mut config = MindConfig::default();
    config.tiers.write_behind = true;
    let store = MindStore::with_tiers(config, vec![sqlite.clone()], None).await;

    for i in 0..20 {
        store.append_memory(AgentId(5), event(&format!("e{i}"), 1)).await.expect("append");
    }
    store.shutdown().await;

    let key = StoreKey::Memories(AgentId(5)).to_string();
    assert_eq!(sqlite.list_len(&key).expect("len"), 20);
    // Issue order is kept, so the newest stored entry is the last append.
    let newest = sqlite.range(&key, 1).await.expect("range");
    let record: serde_json::Value = serde_json::from_slice(&newest[0]).expect("json");
    assert_eq!(record["content"], "e19");
}

// ---------------------------------------------------------------------------
// Promotion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn promotion_boundary_and_snapshots() {
    let ledger = Arc::new(RecordingLedger::default());
    let mut config = MindConfig::in_process_only();
    config.promotion.controller = Address::from_low_u64(0xc0);
    let store = MindStore::open(config, Some(ledger.clone())).await;

    let agent = AgentId(21);
    store.initialize_from_archetype(agent, "guardian", "Gatekeeper.", vec![]).await.expect("init");
    let at_70 = store.append_memory(agent, event("ordinary", 70)).await.expect("append");
    let at_71 = store.append_memory(agent, event("remarkable", 71)).await.expect("append");
    store.shutdown().await;

    assert_eq!(ledger.snapshots(), 1);
    assert_eq!(ledger.memory_ids(), vec![at_71.id]);
    assert!(!ledger.memory_ids().contains(&at_70.id));
    assert!(ledger.entries.lock().iter().all(|(c, _)| *c == Address::from_low_u64(0xc0)));

    let stats = store.promotion_stats();
    assert_eq!((stats.submitted, stats.committed, stats.failed), (2, 2, 0));
}

#[tokio::test]
async fn failed_promotion_keeps_local_state() {
    let ledger = Arc::new(RecordingLedger::default());
    *ledger.reject.lock() = true;
    let store = MindStore::open(MindConfig::in_process_only(), Some(ledger.clone())).await;

    let rec = store
        .append_memory(AgentId(1), event("dragon slain", 99))
        .await
        .expect("append succeeds even if the ledger fails");
    store.shutdown().await;

    assert_eq!(store.recent_memories(AgentId(1), 1).await[0].id, rec.id);
    assert_eq!(store.promotion_stats().failed, 1);
    assert!(ledger.entries.lock().is_empty());
}

#[tokio::test]
async fn promotion_disabled_never_touches_ledger() {
    let ledger = Arc::new(RecordingLedger::default());
    let mut config = MindConfig::in_process_only();
    config.promotion.enabled = false;
    let store = MindStore::open(config, Some(ledger.clone())).await;
    store.append_memory(AgentId(1), event("big", 100)).await.expect("append");
    store.shutdown().await;
    assert!(ledger.entries.lock().is_empty());
    assert_eq!(store.promotion_stats().submitted, 0);
}

// ---------------------------------------------------------------------------
// Full flow and concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interaction_flow_feeds_briefing() {
    let store = MindStore::open(MindConfig::in_process_only(), None).await;
    let agent = AgentId(30);
    let stranger = Address::from_low_u64(0x5);
    assert_eq!(store.build_briefing(agent, "x").await, NEUTRAL_BRIEFING);

    store
        .initialize_from_archetype(agent, "warrior", "Guards the bridge.", vec!["spits".into()])
        .await
        .expect("init");
    store
        .append_memory(
            agent,
            MemoryDraft::new(MemoryKind::Interaction, "was paid a toll")
                .with_counterpart(stranger)
                .with_significance(35),
        )
        .await
        .expect("append");
    store
        .append_memory(
            agent,
            MemoryDraft::new(MemoryKind::Dialogue, "was mocked")
                .with_counterpart(stranger)
                .with_significance(10)
                .with_polarity(Polarity::Negative),
        )
        .await
        .expect("append");

    let rel = store.get_relationship(agent, stranger).await.expect("rel");
    assert_eq!(rel.affinity(), 25);
    assert_eq!(rel.label(), RelationshipLabel::Neutral);

    let text = store.build_briefing(agent, "The stranger returns.").await;
    assert!(text.starts_with("Backstory: Guards the bridge.\nQuirks: spits\n"));
    assert!(text.contains("aggression (strong)"));
    let mocked = text.find("[-] was mocked").expect("newest memory");
    let paid = text.find("[+] was paid a toll").expect("older memory");
    assert!(mocked < paid);
    assert!(text.ends_with("Situation: The stranger returns."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn agents_progress_independently() {
    let store = Arc::new(MindStore::open(MindConfig::in_process_only(), None).await);
    let mut handles = Vec::new();
    for n in 0..16u64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let agent = AgentId(n);
            for i in 0..50 {
                store
                    .append_memory(
                        agent,
                        MemoryDraft::new(MemoryKind::Event, format!("a{n}-{i}"))
                            .with_counterpart(Address::from_low_u64(1))
                            .with_significance(2),
                    )
                    .await
                    .expect("append");
            }
        }));
    }
    for h in handles {
        h.await.expect("task");
    }
    for n in 0..16u64 {
        let recent = store.recent_memories(AgentId(n), 100).await;
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].id, 49);
        let rel = store
            .get_relationship(AgentId(n), Address::from_low_u64(1))
            .await
            .expect("rel");
        assert_eq!(rel.affinity(), 100);
        assert_eq!(rel.interaction_count(), 50);
    }
}
