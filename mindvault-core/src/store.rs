//! The `MindStore` facade.
//!
//! Owns the in-process arena (one `AgentMind` per agent behind its own
//! lock), the durable [`TierChain`] and the promotion pipeline, and exposes
//! every caller-facing operation.
//!
//! # Consistency
//!
//! The arena is the tier of record for decisions made in this process. An
//! operation resolves as soon as the arena is updated; durable writes follow
//! on a background writer (or inline when `tiers.write_behind` is off) and
//! their failures are logged, never returned. Operations on different agents
//! never share a lock. Concurrent writers to the same agent are
//! last-writer-wins: callers are expected to serialize per agent.
//!
//! No lock is held across an `.await`: state needed from the durable tiers is
//! fetched first and merged afterwards.
//!
//! # Unreachable tiers
//!
//! An agent is hydrated only once a durable tier has answered for it. While
//! no tier can be reached its state is unsettled: operations still succeed
//! against the arena, but nothing is written durably and hydration is retried
//! on every access. Settling merges the two sides:
//!
//! - a stored profile wins over one initialized while unsettled;
//! - unsettled memories follow the stored history and are then written out
//!   (their ids start from a time-based floor, so they never reuse a stored
//!   id and can be promoted right away);
//! - unsettled interactions are replayed onto the stored relationship.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::briefing;
use crate::config::MindConfig;
use crate::error::{MindError, Result};
use crate::ledger::{AuthoritativeLedger, LedgerEntry, PromotedMemory, ProfileSnapshot};
use crate::memory::{LOG_CAPACITY, MemoryDraft, MemoryLog, MemoryRecord};
use crate::personality::{self, PersonalityProfile};
use crate::promotion::{self, PromotionQueue, PromotionStats};
use crate::relationship::Relationship;
use crate::tier::{CacheTier, Lookup, SqliteTier, StoreKey, Tier, TierChain};
use crate::types::{Address, AgentId, TraitKind, TraitVector};

// ---------------------------------------------------------------------------
// Per-agent state
// ---------------------------------------------------------------------------

/// Everything this process knows about one agent.
#[derive(Debug, Default)]
struct AgentMind {
    profile: Option<PersonalityProfile>,
    profile_loaded: bool,
    memories: MemoryLog,
    memories_loaded: bool,
    relationships: HashMap<Address, Relationship>,
    /// Interactions applied while the stored relationship was unreadable.
    pending_interactions: HashMap<Address, Vec<(i64, DateTime<Utc>)>>,
}

impl AgentMind {
    fn is_vacant(&self) -> bool {
        self.profile.is_none() && self.memories.is_empty() && self.relationships.is_empty()
    }

    fn has_unsettled(&self) -> bool {
        (!self.profile_loaded && self.profile.is_some())
            || (!self.memories_loaded && !self.memories.is_empty())
            || !self.pending_interactions.is_empty()
    }
}

/// First id for memories appended while an agent's stored history cannot
/// be read. Microseconds since the epoch stay above sequential ids.
fn unsettled_id_floor() -> u64 {
    u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0)
}

type SharedMind = Arc<Mutex<AgentMind>>;

// ---------------------------------------------------------------------------
// Durable writes
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum TierWrite {
    Put(StoreKey, Vec<u8>),
    Push(StoreKey, Vec<u8>),
}

impl TierWrite {
    async fn apply(self, chain: &TierChain) {
        let (key, acks) = match self {
            Self::Put(key, bytes) => {
                let acks = chain.write(&key, &bytes).await;
                (key, acks)
            }
            Self::Push(key, bytes) => {
                let acks = chain.push(&key, &bytes).await;
                (key, acks)
            }
        };
        if acks.written() == 0 {
            warn!(key = %key, "No durable tier accepted write");
        } else {
            debug!(key = %key, tiers = acks.written(), "Durable write");
        }
    }
}

/// Single background writer so durable writes keep their issue order.
struct WriteBehind {
    sender: Mutex<Option<mpsc::UnboundedSender<TierWrite>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBehind {
    fn spawn(chain: Arc<TierChain>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TierWrite>();
        let worker = tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                write.apply(&chain).await;
            }
        });
        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a write. Returns it back if the writer has been shut down.
    fn send(&self, write: TierWrite) -> std::result::Result<(), TierWrite> {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(write).map_err(|e| e.0),
            None => Err(write),
        }
    }

    async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!(error = %e, "Write-behind worker ended abnormally");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MindStore
// ---------------------------------------------------------------------------

/// Persistent mind state for a population of agents.
pub struct MindStore {
    config: MindConfig,
    arena: DashMap<AgentId, SharedMind>,
    chain: Arc<TierChain>,
    writer: Option<WriteBehind>,
    promotion: Option<PromotionQueue>,
}

impl std::fmt::Debug for MindStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindStore")
            .field("agents", &self.arena.len())
            .field("chain", &self.chain)
            .field("write_behind", &self.writer.is_some())
            .field("promotion", &self.promotion)
            .finish_non_exhaustive()
    }
}

impl MindStore {
    /// Build the tiers named in `config` and open the store.
    ///
    /// A tier that cannot be constructed (for example an unopenable `SQLite`
    /// path) is logged and left out; the store still opens. Promotion runs
    /// only if it is enabled and a `ledger` is supplied.
    pub async fn open(config: MindConfig, ledger: Option<Arc<dyn AuthoritativeLedger>>) -> Self {
        let mut tiers: Vec<Arc<dyn Tier>> = Vec::new();
        if config.tiers.cache_enabled {
            tiers.push(Arc::new(CacheTier::new(
                config.tiers.cache_max_keys,
                config.tiers.cache_list_capacity,
            )));
        }
        if config.tiers.sqlite_enabled {
            match SqliteTier::open(
                &config.tiers.sqlite_path,
                config.tiers.wal_mode,
                config.tiers.checksum_enabled,
            ) {
                Ok(tier) => tiers.push(Arc::new(tier)),
                Err(e) => warn!(
                    path = %config.tiers.sqlite_path.display(),
                    error = %e,
                    "SQLite tier disabled"
                ),
            }
        }
        Self::with_tiers(config, tiers, ledger).await
    }

    /// Open the store over caller-supplied durable tiers, highest priority
    /// first. The `[tiers]` backend switches in `config` are ignored; the
    /// behavioural ones (`write_behind`, `reprobe_interval_ms`) apply.
    pub async fn with_tiers(
        config: MindConfig,
        tiers: Vec<Arc<dyn Tier>>,
        ledger: Option<Arc<dyn AuthoritativeLedger>>,
    ) -> Self {
        let chain = Arc::new(TierChain::new(
            tiers,
            Duration::from_millis(config.tiers.reprobe_interval_ms),
        ));
        chain.probe_all().await;

        let writer = (config.tiers.write_behind && !chain.is_empty())
            .then(|| WriteBehind::spawn(Arc::clone(&chain)));

        let promotion = match ledger {
            Some(ledger) if config.promotion.enabled => Some(PromotionQueue::spawn(
                ledger,
                config.promotion.controller,
                config.promotion.queue_capacity,
            )),
            Some(_) => None,
            None => {
                if config.promotion.enabled {
                    info!("No authoritative ledger supplied; promotion disabled");
                }
                None
            }
        };

        info!(
            tiers = ?chain.available_tiers(),
            configured = chain.len(),
            write_behind = writer.is_some(),
            promotion = promotion.is_some(),
            "MindStore opened"
        );

        Self {
            config,
            arena: DashMap::new(),
            chain,
            writer,
            promotion,
        }
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Tier management
    // ------------------------------------------------------------------

    /// Probe every durable tier now.
    pub async fn probe_tiers(&self) {
        self.chain.probe_all().await;
    }

    /// Names of the durable tiers currently considered available. The
    /// in-process arena is always available and not listed.
    #[must_use]
    pub fn available_tiers(&self) -> Vec<String> {
        self.chain.available_tiers()
    }

    /// Drop an agent's in-process state. Durable tiers keep their data and
    /// the agent is hydrated from them on next access. Returns whether any
    /// state was held.
    ///
    /// With write-behind enabled, writes still queued for the agent are not
    /// visible to that hydration until the writer reaches them. Unsettled
    /// state never reached a durable tier and is lost.
    pub fn evict(&self, agent: AgentId) -> bool {
        let Some((_, mind)) = self.arena.remove(&agent) else {
            return false;
        };
        if mind.lock().has_unsettled() {
            warn!(agent = %agent, "Evicted agent with unsettled state");
        } else {
            debug!(agent = %agent, "Evicted from arena");
        }
        true
    }

    /// Number of agents with in-process state.
    #[must_use]
    pub fn resident_agents(&self) -> usize {
        self.arena.len()
    }

    /// Promotion counters; all zero when promotion is disabled.
    #[must_use]
    pub fn promotion_stats(&self) -> PromotionStats {
        self.promotion
            .as_ref()
            .map(PromotionQueue::stats)
            .unwrap_or_default()
    }

    /// Flush pending durable writes and promotions, then stop the
    /// background workers. Later writes go inline and later promotions are
    /// dropped.
    pub async fn shutdown(&self) {
        if let Some(writer) = &self.writer {
            writer.shutdown().await;
        }
        if let Some(queue) = &self.promotion {
            queue.shutdown().await;
        }
        info!(stats = ?self.promotion_stats(), "MindStore shut down");
    }

    // ------------------------------------------------------------------
    // Personality
    // ------------------------------------------------------------------

    /// Create an agent's personality profile.
    ///
    /// # Errors
    /// - [`MindError::MissingField`] for a blank backstory or quirk.
    /// - [`MindError::AlreadyInitialized`] if a profile exists in the arena or
    ///   any durable tier; the existing profile is left unchanged.
    ///
    /// If no durable tier can be reached the profile is kept in the arena
    /// only, and is replaced by a stored profile found later.
    pub async fn initialize_personality(
        &self,
        agent: AgentId,
        traits: TraitVector,
        backstory: impl Into<String>,
        quirks: Vec<String>,
    ) -> Result<PersonalityProfile> {
        let profile = PersonalityProfile::new(agent, traits, backstory, quirks)?;
        let mind = self.mind(agent);
        self.load_profile(agent, &mind).await;

        let settled = {
            let mut m = mind.lock();
            if m.profile.is_some() {
                return Err(MindError::AlreadyInitialized(agent));
            }
            m.profile = Some(profile.clone());
            m.profile_loaded
        };

        if settled {
            info!(agent = %agent, "Personality initialized");
            self.persist_put(StoreKey::Profile(agent), &profile).await;
            self.promote_snapshot(&profile);
        } else {
            warn!(agent = %agent, "Personality initialized in process only; durable tiers unreachable");
        }
        Ok(profile)
    }

    /// Create a profile seeded from a named archetype. Unknown names use
    /// the default archetype.
    ///
    /// # Errors
    /// Same as [`MindStore::initialize_personality`].
    pub async fn initialize_from_archetype(
        &self,
        agent: AgentId,
        archetype: &str,
        backstory: impl Into<String>,
        quirks: Vec<String>,
    ) -> Result<PersonalityProfile> {
        let traits = personality::archetype_traits(archetype);
        self.initialize_personality(agent, traits, backstory, quirks)
            .await
    }

    /// Set one trait on an existing profile.
    ///
    /// # Errors
    /// - [`MindError::InvalidRange`] if `value` is outside `[0, 100]`.
    /// - [`MindError::ProfileNotFound`] if the agent has no profile.
    pub async fn update_trait(&self, agent: AgentId, kind: TraitKind, value: i64) -> Result<PersonalityProfile> {
        // Reject bad input before touching any state.
        TraitVector::saturating([0; TraitKind::COUNT]).set(kind, value)?;

        let mind = self.mind(agent);
        self.load_profile(agent, &mind).await;
        let updated = {
            let mut guard = mind.lock();
            let m = &mut *guard;
            match m.profile.as_mut() {
                Some(profile) => {
                    profile.update_trait(kind, value)?;
                    Some((profile.clone(), m.profile_loaded))
                }
                None => None,
            }
        };
        let Some((updated, settled)) = updated else {
            self.release_if_vacant(agent);
            return Err(MindError::ProfileNotFound(agent));
        };

        debug!(agent = %agent, %kind, value, "Trait updated");
        if settled {
            self.persist_put(StoreKey::Profile(agent), &updated).await;
        }
        Ok(updated)
    }

    /// The agent's profile, from the arena or the first durable tier that
    /// holds it.
    pub async fn get_profile(&self, agent: AgentId) -> Option<PersonalityProfile> {
        let Some(mind) = self.resident(agent) else {
            return self.read_json(&StoreKey::Profile(agent)).await.found();
        };
        self.load_profile(agent, &mind).await;
        mind.lock().profile.clone()
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    /// Apply an affinity change toward `counterpart`, creating the
    /// relationship on first contact.
    ///
    /// The null address is an anonymous event: nothing is stored and `None`
    /// is returned.
    pub async fn record_interaction(
        &self,
        agent: AgentId,
        counterpart: Address,
        delta: i64,
    ) -> Option<Relationship> {
        if counterpart.is_null() {
            debug!(agent = %agent, "Interaction with null address not recorded");
            return None;
        }
        let mind = self.mind(agent);
        let known = self.load_relationship(agent, counterpart, &mind).await;

        let updated = {
            let mut guard = mind.lock();
            let m = &mut *guard;
            let now = Utc::now();
            let rel = m
                .relationships
                .entry(counterpart)
                .or_insert_with(|| Relationship::new(agent, counterpart));
            rel.record(delta, now);
            if !known {
                m.pending_interactions
                    .entry(counterpart)
                    .or_default()
                    .push((delta, now));
            }
            rel.clone()
        };

        debug!(
            agent = %agent,
            counterpart = %counterpart,
            delta,
            affinity = updated.affinity(),
            label = %updated.label(),
            "Interaction recorded"
        );
        if known {
            self.persist_put(StoreKey::Relationship(agent, counterpart), &updated)
                .await;
        }
        Some(updated)
    }

    /// The relationship toward `counterpart`, if one exists.
    pub async fn get_relationship(&self, agent: AgentId, counterpart: Address) -> Option<Relationship> {
        if counterpart.is_null() {
            return None;
        }
        let key = StoreKey::Relationship(agent, counterpart);
        let Some(mind) = self.resident(agent) else {
            return self
                .read_json::<Relationship>(&key)
                .await
                .found()
                .map(Relationship::sanitized);
        };
        self.load_relationship(agent, counterpart, &mind).await;
        mind.lock().relationships.get(&counterpart).cloned()
    }

    // ------------------------------------------------------------------
    // Episodic memory
    // ------------------------------------------------------------------

    /// Append a memory and apply its side effects, in order: arena push
    /// (trimming the oldest past capacity), durable write-through,
    /// relationship update for a non-null counterpart, promotion.
    ///
    /// # Errors
    /// [`MindError::MissingField`] for empty content,
    /// [`MindError::InvalidRange`] for significance outside `[0, 100]`.
    /// Nothing is changed on error.
    pub async fn append_memory(&self, agent: AgentId, draft: MemoryDraft) -> Result<MemoryRecord> {
        draft.validate()?;
        let mind = self.mind(agent);
        self.load_memories(agent, &mind).await;

        let (record, trimmed, settled) = {
            let mut m = mind.lock();
            if !m.memories_loaded {
                m.memories.raise_next_id(unsettled_id_floor());
            }
            let record = draft.into_record(m.memories.next_id(), Utc::now())?;
            let trimmed = m.memories.push(record.clone());
            (record, trimmed, m.memories_loaded)
        };
        if trimmed > 0 {
            if settled {
                debug!(agent = %agent, trimmed, "Memory view trimmed");
            } else {
                warn!(agent = %agent, trimmed, "Unsettled memories trimmed before reaching a durable tier");
            }
        }

        if settled {
            if let Some(bytes) = encode(&StoreKey::Memories(agent), &record) {
                self.persist(TierWrite::Push(StoreKey::Memories(agent), bytes))
                    .await;
            }
        }

        if let Some(counterpart) = record.relationship_target() {
            self.record_interaction(agent, counterpart, record.affinity_delta())
                .await;
        }

        if promotion::should_promote(&record) {
            debug!(agent = %agent, id = record.id, significance = record.significance, "Promoting memory");
            self.promote(LedgerEntry::Memory(PromotedMemory::from_record(agent, &record)));
        }
        Ok(record)
    }

    /// Up to `count` memories, most recent first: from the arena, or if it
    /// holds none, from the first durable tier with a non-empty list.
    pub async fn recent_memories(&self, agent: AgentId, count: usize) -> Vec<MemoryRecord> {
        let key = StoreKey::Memories(agent);
        if let Some(mind) = self.resident(agent) {
            self.load_memories(agent, &mind).await;
            let m = mind.lock();
            if !m.memories.is_empty() {
                return m.memories.recent(count);
            }
        }
        self.range_json(&key, count)
            .await
            .found()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Briefing
    // ------------------------------------------------------------------

    /// Render the agent's briefing for `situation`. Agents without a profile
    /// get [`briefing::NEUTRAL_BRIEFING`].
    pub async fn build_briefing(&self, agent: AgentId, situation: &str) -> String {
        let Some(profile) = self.get_profile(agent).await else {
            return briefing::NEUTRAL_BRIEFING.to_string();
        };
        let recent = self
            .recent_memories(agent, briefing::BRIEFING_MEMORIES)
            .await;
        briefing::build_briefing(Some(&profile), &recent, situation)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// The agent's arena slot, created on first use. Only writes create one.
    fn mind(&self, agent: AgentId) -> SharedMind {
        Arc::clone(self.arena.entry(agent).or_default().value())
    }

    fn resident(&self, agent: AgentId) -> Option<SharedMind> {
        self.arena.get(&agent).map(|entry| Arc::clone(entry.value()))
    }

    fn release_if_vacant(&self, agent: AgentId) {
        self.arena.remove_if(&agent, |_, mind| mind.lock().is_vacant());
    }

    async fn load_profile(&self, agent: AgentId, mind: &Mutex<AgentMind>) {
        if mind.lock().profile_loaded {
            return;
        }
        let key = StoreKey::Profile(agent);
        let stored = match self.read_json::<PersonalityProfile>(&key).await {
            Lookup::Found(profile) => Some(profile),
            Lookup::Absent => None,
            Lookup::Unreachable => return,
        };
        let unsettled = {
            let mut m = mind.lock();
            if m.profile_loaded {
                return;
            }
            m.profile_loaded = true;
            match (stored, m.profile.take()) {
                (Some(stored), local) => {
                    if local.is_some_and(|local| local != stored) {
                        warn!(agent = %agent, "Stored profile replaces one initialized while unsettled");
                    }
                    m.profile = Some(stored);
                    None
                }
                (None, local) => {
                    m.profile.clone_from(&local);
                    local
                }
            }
        };
        if let Some(profile) = unsettled {
            info!(agent = %agent, "Settling profile initialized while tiers were unreachable");
            self.persist_put(key, &profile).await;
            self.promote_snapshot(&profile);
        }
    }

    /// Hydrate one relationship. Returns whether its durable state is known.
    async fn load_relationship(&self, agent: AgentId, counterpart: Address, mind: &Mutex<AgentMind>) -> bool {
        {
            let m = mind.lock();
            if m.relationships.contains_key(&counterpart)
                && !m.pending_interactions.contains_key(&counterpart)
            {
                return true;
            }
        }
        let key = StoreKey::Relationship(agent, counterpart);
        let stored = match self.read_json::<Relationship>(&key).await {
            Lookup::Found(rel) => Some(rel.sanitized()),
            Lookup::Absent => None,
            Lookup::Unreachable => return false,
        };
        let settled = {
            let mut m = mind.lock();
            match m.pending_interactions.remove(&counterpart) {
                None => {
                    if let Some(stored) = stored {
                        m.relationships.entry(counterpart).or_insert(stored);
                    }
                    None
                }
                Some(pending) => {
                    let mut rel = stored.unwrap_or_else(|| Relationship::new(agent, counterpart));
                    for (delta, at) in pending {
                        rel.record(delta, at);
                    }
                    m.relationships.insert(counterpart, rel.clone());
                    Some(rel)
                }
            }
        };
        if let Some(rel) = settled {
            info!(
                agent = %agent,
                counterpart = %counterpart,
                affinity = rel.affinity(),
                "Settling interactions recorded while tiers were unreachable"
            );
            self.persist_put(key, &rel).await;
        }
        true
    }

    async fn load_memories(&self, agent: AgentId, mind: &Mutex<AgentMind>) {
        if mind.lock().memories_loaded {
            return;
        }
        let key = StoreKey::Memories(agent);
        let newest_first = match self.range_json::<MemoryRecord>(&key, LOG_CAPACITY).await {
            Lookup::Found(records) => records,
            Lookup::Absent => Vec::new(),
            Lookup::Unreachable => return,
        };
        let unsettled: Vec<MemoryRecord> = {
            let mut m = mind.lock();
            if m.memories_loaded {
                return;
            }
            m.memories_loaded = true;
            if !newest_first.is_empty() {
                debug!(agent = %agent, n = newest_first.len(), "Memories hydrated");
            }
            let unsettled: Vec<MemoryRecord> = m.memories.iter().cloned().collect();
            m.memories = MemoryLog::hydrate(newest_first);
            for record in &unsettled {
                m.memories.push(record.clone());
            }
            unsettled
        };
        if unsettled.is_empty() {
            return;
        }
        info!(agent = %agent, n = unsettled.len(), "Settling memories recorded while tiers were unreachable");
        for record in &unsettled {
            if let Some(bytes) = encode(&key, record) {
                self.persist(TierWrite::Push(key, bytes)).await;
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &StoreKey) -> Lookup<T> {
        match self.chain.read(key).await {
            Lookup::Found(bytes) => serde_json::from_slice(&bytes).map_or_else(
                |e| {
                    warn!(key = %key, error = %e, "Discarding undecodable record");
                    Lookup::Absent
                },
                Lookup::Found,
            ),
            Lookup::Absent => Lookup::Absent,
            Lookup::Unreachable => Lookup::Unreachable,
        }
    }

    async fn range_json<T: DeserializeOwned>(&self, key: &StoreKey, count: usize) -> Lookup<Vec<T>> {
        self.chain.range(key, count).await.map(|entries| {
            entries
                .iter()
                .filter_map(|bytes| {
                    serde_json::from_slice(bytes)
                        .map_err(|e| warn!(key = %key, error = %e, "Discarding undecodable list entry"))
                        .ok()
                })
                .collect()
        })
    }

    async fn persist_put<T: Serialize>(&self, key: StoreKey, value: &T) {
        if let Some(bytes) = encode(&key, value) {
            self.persist(TierWrite::Put(key, bytes)).await;
        }
    }

    async fn persist(&self, write: TierWrite) {
        if self.chain.is_empty() {
            return;
        }
        let inline = match &self.writer {
            Some(writer) => writer.send(write).err(),
            None => Some(write),
        };
        if let Some(write) = inline {
            write.apply(&self.chain).await;
        }
    }

    fn promote_snapshot(&self, profile: &PersonalityProfile) {
        if self.config.promotion.promote_profiles {
            self.promote(LedgerEntry::ProfileSnapshot(ProfileSnapshot::from(profile)));
        }
    }

    fn promote(&self, entry: LedgerEntry) {
        if let Some(queue) = &self.promotion {
            queue.submit(entry);
        }
    }
}

fn encode<T: Serialize>(key: &StoreKey, value: &T) -> Option<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| warn!(key = %key, error = %e, "Value not persisted: encoding failed"))
        .ok()
}
