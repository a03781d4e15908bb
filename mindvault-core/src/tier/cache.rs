//! Shared cache tier.
//!
//! An LRU of records and bounded newest-first lists behind one lock. Cloned
//! handles share the same storage, which is how several stores in one
//! process see a common cache. A networked cache plugs in by implementing
//! [`Tier`] with the same list semantics.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::{Tier, TierError, TierResult};

enum Slot {
    Record(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

/// LRU-backed cache tier with a bounded list view per key.
#[derive(Clone)]
pub struct CacheTier {
    entries: Arc<Mutex<LruCache<String, Slot>>>,
    list_capacity: usize,
    online: Arc<AtomicBool>,
}

impl std::fmt::Debug for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTier")
            .field("keys", &self.entries.lock().len())
            .field("list_capacity", &self.list_capacity)
            .field("online", &self.is_online())
            .finish()
    }
}

impl CacheTier {
    /// Create a cache holding at most `max_keys` keys, each list trimmed to
    /// `list_capacity` newest entries. Zero values are raised to one.
    #[must_use]
    pub fn new(max_keys: usize, list_capacity: usize) -> Self {
        let cap = NonZeroUsize::new(max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(cap))),
            list_capacity: list_capacity.max(1),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Mark the cache reachable or unreachable. While offline every call
    /// fails with [`TierError::Unavailable`]; stored data is kept.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether the cache currently accepts calls.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check_online(&self) -> TierResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(TierError::Unavailable("cache offline".to_string()))
        }
    }
}

#[async_trait]
impl Tier for CacheTier {
    fn name(&self) -> &str {
        "cache"
    }

    async fn probe(&self) -> TierResult<()> {
        self.check_online()
    }

    async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>> {
        self.check_online()?;
        match self.entries.lock().get(key) {
            Some(Slot::Record(bytes)) => Ok(Some(bytes.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> TierResult<()> {
        self.check_online()?;
        self.entries
            .lock()
            .put(key.to_string(), Slot::Record(value.to_vec()));
        Ok(())
    }

    async fn push(&self, key: &str, value: &[u8]) -> TierResult<()> {
        self.check_online()?;
        let mut entries = self.entries.lock();
        let slot = entries.get_or_insert_mut(key.to_string(), || Slot::List(VecDeque::new()));
        if let Slot::Record(_) = slot {
            *slot = Slot::List(VecDeque::new());
        }
        if let Slot::List(list) = slot {
            list.push_front(value.to_vec());
            if list.len() > self.list_capacity {
                list.truncate(self.list_capacity);
                debug!(key, cap = self.list_capacity, "Cache list view trimmed");
            }
        }
        Ok(())
    }

    async fn range(&self, key: &str, count: usize) -> TierResult<Vec<Vec<u8>>> {
        self.check_online()?;
        match self.entries.lock().get(key) {
            Some(Slot::List(list)) => Ok(list.iter().take(count).cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }
}
