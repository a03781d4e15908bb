//! Bounded, chronologically ordered in-process memory view.

use std::collections::VecDeque;

use super::MemoryRecord;

/// Maximum records kept in an agent's in-process view.
pub const LOG_CAPACITY: usize = 100;

/// One agent's recent memories, oldest first, never longer than its
/// capacity. Trimming happens inline on every push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLog {
    records: VecDeque<MemoryRecord>,
    capacity: usize,
    next_id: u64,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl MemoryLog {
    /// An empty log holding at most `capacity` records (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    /// Rebuild a log from durable records given newest first, as a tier's
    /// `range` returns them. The next id continues after the highest seen.
    #[must_use]
    pub fn hydrate(newest_first: Vec<MemoryRecord>) -> Self {
        let mut log = Self::default();
        log.next_id = newest_first
            .iter()
            .map(|r| r.id.saturating_add(1))
            .max()
            .unwrap_or(0);
        for record in newest_first.into_iter().take(log.capacity).rev() {
            log.records.push_back(record);
        }
        log
    }

    /// Id the next appended record will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Lift the next id to at least `floor`. Ids already handed out are
    /// never reused.
    pub fn raise_next_id(&mut self, floor: u64) {
        self.next_id = self.next_id.max(floor);
    }

    /// Append a record and trim the oldest entries beyond capacity.
    /// Returns how many records were trimmed.
    pub fn push(&mut self, record: MemoryRecord) -> usize {
        self.next_id = self.next_id.max(record.id.saturating_add(1));
        self.records.push_back(record);
        let excess = self.records.len().saturating_sub(self.capacity);
        self.records.drain(..excess);
        excess
    }

    /// Up to `count` records, most recent first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<MemoryRecord> {
        self.records.iter().rev().take(count).cloned().collect()
    }

    /// All held records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter()
    }

    /// Number of held records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::memory::MemoryDraft;
    use crate::types::MemoryKind;

    fn record(id: u64) -> MemoryRecord {
        MemoryDraft::new(MemoryKind::Event, format!("event {id}"))
            .into_record(id, Utc::now())
            .expect("valid")
    }

    #[test]
    fn trims_oldest_past_capacity() {
        let mut log = MemoryLog::default();
        for id in 0..150 {
            log.push(record(id));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let ids: Vec<u64> = log.iter().map(|r| r.id).collect();
        assert_eq!(ids, (50..150).collect::<Vec<_>>());
        assert_eq!(log.next_id(), 150);
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let mut log = MemoryLog::with_capacity(10);
        for id in 0..4 {
            log.push(record(id));
        }
        let ids: Vec<u64> = log.recent(3).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(log.recent(50).len(), 4);
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn hydrate_restores_order_and_next_id() {
        let newest_first: Vec<_> = (0..130).rev().map(record).collect();
        let log = MemoryLog::hydrate(newest_first);
        assert_eq!(log.len(), LOG_CAPACITY);
        assert_eq!(log.iter().next().map(|r| r.id), Some(30));
        assert_eq!(log.recent(1)[0].id, 129);
        assert_eq!(log.next_id(), 130);
    }

    #[test]
    fn raised_floor_only_moves_forward() {
        let mut log = MemoryLog::default();
        log.push(record(7));
        log.raise_next_id(3);
        assert_eq!(log.next_id(), 8);
        log.raise_next_id(1_000);
        assert_eq!(log.next_id(), 1_000);
        log.push(record(1_000));
        assert_eq!(log.next_id(), 1_001);
    }

    #[test]
    fn hydrate_empty_starts_at_zero() {
        let log = MemoryLog::hydrate(Vec::new());
        assert!(log.is_empty());
        assert_eq!(log.next_id(), 0);
    }
}
