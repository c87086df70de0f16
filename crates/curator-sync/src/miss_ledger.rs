//! Consecutive mapping-miss counter for records that stay pending.
//!
//! A tag or relation whose cloud id cannot be resolved is skipped and retried
//! next cycle. When the same record misses `threshold` cycles in a row it is
//! escalated once so a permanently rejected definition does not go unnoticed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

/// Record tracked by the ledger, by local row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MissKey {
    Tag(i64),
    Relation(i64),
}

impl fmt::Display for MissKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissKey::Tag(id) => write!(f, "file_tags:{id}"),
            MissKey::Relation(id) => write!(f, "file_tag_relations:{id}"),
        }
    }
}

#[derive(Debug)]
pub struct MissLedger {
    threshold: u32,
    misses: HashMap<MissKey, u32>,
}

impl MissLedger {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            misses: HashMap::new(),
        }
    }

    /// Count a miss. Returns the streak length when it just reached the
    /// threshold, so each streak escalates once.
    pub fn record_miss(&mut self, key: MissKey) -> Option<u32> {
        let count = self.misses.entry(key).or_insert(0);
        *count = count.saturating_add(1);
        (*count == self.threshold).then_some(*count)
    }

    /// Forget records that were uploaded.
    pub fn clear<I: IntoIterator<Item = MissKey>>(&mut self, keys: I) {
        for key in keys {
            self.misses.remove(&key);
        }
    }

    /// Close a cycle: keep only records missed in it. Anything uploaded,
    /// deleted or not selected this cycle loses its streak.
    pub fn end_cycle(&mut self, missed: &HashSet<MissKey>) {
        self.misses.retain(|key, _| missed.contains(key));
    }

    pub fn misses(&self, key: MissKey) -> u32 {
        self.misses.get(&key).copied().unwrap_or(0)
    }

    /// Records currently at or past the threshold.
    pub fn escalated(&self) -> Vec<MissKey> {
        let mut keys: Vec<MissKey> = self
            .misses
            .iter()
            .filter(|(_, count)| **count >= self.threshold)
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.misses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.misses.is_empty()
    }
}
