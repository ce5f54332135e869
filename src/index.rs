//! In-memory session index keyed by session id
//!
//! Upserts replace the stored entity wholesale. Each key keeps the sequence
//! number of its first insertion, which breaks timestamp ties in snapshots
//! so repeated snapshots list equal-timestamp sessions in a stable order.

use crate::types::SessionEntity;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Debug)]
struct Slot {
    seq: u64,
    entity: SessionEntity,
}

#[derive(Debug, Default)]
pub struct SessionIndex {
    entries: HashMap<String, Slot>,
    next_seq: u64,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns true when the key was not present before
    pub fn upsert(&mut self, entity: SessionEntity) -> bool {
        match self.entries.get_mut(&entity.session_id) {
            Some(slot) => {
                slot.entity = entity;
                false
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(entity.session_id.clone(), Slot { seq, entity });
                true
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionEntity> {
        self.entries.get(session_id).map(|slot| &slot.entity)
    }

    /// All sessions, newest record timestamp first
    pub fn snapshot(&self) -> Vec<SessionEntity> {
        let mut slots: Vec<&Slot> = self.entries.values().collect();
        slots.sort_by_key(|slot| (Reverse(slot.entity.timestamp), slot.seq));
        slots.into_iter().map(|slot| slot.entity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionKind, ZERO_ADDRESS};
    use alloy::primitives::U256;

    fn session(id: &str, timestamp: u64, verified: bool) -> SessionEntity {
        SessionEntity {
            session_id: id.to_string(),
            payer: ZERO_ADDRESS.to_string(),
            kind: SessionKind::Hourly,
            tree_count: U256::from(1),
            donation_amount: U256::from(100),
            timestamp,
            verified,
            block_number: None,
            transaction_hash: None,
        }
    }

    fn ids(index: &SessionIndex) -> Vec<String> {
        index.snapshot().into_iter().map(|s| s.session_id).collect()
    }

    #[test]
    fn test_upsert_twice_is_idempotent() {
        let mut once = SessionIndex::new();
        once.upsert(session("s1", 10, false));

        let mut twice = SessionIndex::new();
        assert!(twice.upsert(session("s1", 10, false)));
        assert!(!twice.upsert(session("s1", 10, false)));

        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn test_latest_write_wins_entirely() {
        let mut index = SessionIndex::new();
        let mut first = session("s1", 10, false);
        first.block_number = Some(5);
        first.transaction_hash = Some("0x01".to_string());
        index.upsert(first);

        let second = session("s1", 20, true);
        index.upsert(second.clone());

        // no field of the first write survives, including its origin
        assert_eq!(index.get("s1"), Some(&second));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_snapshot_order() {
        let mut index = SessionIndex::new();
        index.upsert(session("old", 100, false));
        index.upsert(session("tie_a", 200, false));
        index.upsert(session("new", 300, false));
        index.upsert(session("tie_b", 200, false));
        index.upsert(session("unknown", 0, false));

        assert_eq!(ids(&index), vec!["new", "tie_a", "tie_b", "old", "unknown"]);

        // re-upserting keeps the original tie position
        index.upsert(session("tie_a", 200, true));
        assert_eq!(ids(&index), vec!["new", "tie_a", "tie_b", "old", "unknown"]);
    }

    #[test]
    fn test_clear() {
        let mut index = SessionIndex::new();
        index.upsert(session("s1", 1, false));
        index.clear();
        assert!(index.is_empty());
        assert!(index.snapshot().is_empty());
        assert!(index.get("s1").is_none());
    }
}
