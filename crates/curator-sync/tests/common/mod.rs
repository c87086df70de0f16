//! Shared helpers for sync engine integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use curator_cloud::mock::MockCloudService;
use curator_core::{
    ConnectivityProbe, Dimension, DimensionExpansion, FileRecord, FileTagRelation, PendingCounts,
    Result, SyncStatus, SyncStore, TagExpansion, TagRecord,
};
use curator_db::test_fixtures::TestDatabase;
use curator_sync::{SyncConfig, SyncEngine};

/// Engine over a migrated in-memory database and a mock cloud.
pub fn db_engine(
    test_db: &TestDatabase,
    cloud: &MockCloudService,
    config: SyncConfig,
) -> SyncEngine {
    SyncEngine::new(
        Arc::new(test_db.db.sync.clone()),
        Arc::new(cloud.clone()),
        Arc::new(curator_core::AlwaysOnline),
        config,
    )
}

/// Probe with a switchable answer that counts how often it was asked.
#[derive(Default)]
pub struct SwitchProbe {
    pub offline: AtomicBool,
    pub checks: AtomicUsize,
}

impl SwitchProbe {
    pub fn offline() -> Self {
        Self {
            offline: AtomicBool::new(true),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for SwitchProbe {
    async fn is_online(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        !self.offline.load(Ordering::SeqCst)
    }
}

/// In-memory store holding pending tags only; counts every call.
///
/// Used where a paused tokio clock rules out the SQLite pool.
#[derive(Default)]
pub struct MemoryStore {
    tags: Mutex<Vec<TagRecord>>,
    synced: Mutex<HashSet<i64>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_pending_tag(dimension: &str, tag: &str) -> Self {
        let store = Self::default();
        store.tags.lock().unwrap().push(TagRecord {
            id: 1,
            name: tag.to_string(),
            created_at: Utc::now(),
            sync_status: SyncStatus::Pending,
            dimension: Dimension {
                id: 1,
                name: dimension.to_string(),
                level: 1,
                description: None,
                is_ai_generated: false,
                trigger_conditions: None,
                applicable_file_types: None,
                context_hints: None,
                created_at: Utc::now(),
                sync_status: SyncStatus::Pending,
            },
        });
        store
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_synced(&self, tag_id: i64) -> bool {
        self.synced.lock().unwrap().contains(&tag_id)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn pending_files(&self, _workspace_type: &str, _limit: i64) -> Result<Vec<FileRecord>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn tags_for_files(&self, _file_ids: &[i64]) -> Result<Vec<TagRecord>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn pending_tags(&self, limit: i64) -> Result<Vec<TagRecord>> {
        self.touch();
        let synced = self.synced.lock().unwrap().clone();
        Ok(self
            .tags
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !synced.contains(&t.id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn relations_for_files(&self, _file_ids: &[i64]) -> Result<Vec<FileTagRelation>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn pending_relations_of_synced_files(&self, _limit: i64) -> Result<Vec<FileTagRelation>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn pending_dimension_expansions(&self, _limit: i64) -> Result<Vec<DimensionExpansion>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn pending_tag_expansions(&self, _limit: i64) -> Result<Vec<TagExpansion>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn mark_tags_synced(&self, ids: &[i64]) -> Result<u64> {
        self.touch();
        self.synced.lock().unwrap().extend(ids.iter().copied());
        Ok(ids.len() as u64)
    }

    async fn mark_files_and_relations_synced(
        &self,
        file_ids: &[i64],
        relation_ids: &[i64],
    ) -> Result<(u64, u64)> {
        self.touch();
        Ok((file_ids.len() as u64, relation_ids.len() as u64))
    }

    async fn mark_dimension_expansions_synced(&self, ids: &[i64]) -> Result<u64> {
        self.touch();
        Ok(ids.len() as u64)
    }

    async fn mark_tag_expansions_synced(&self, ids: &[i64]) -> Result<u64> {
        self.touch();
        Ok(ids.len() as u64)
    }

    async fn delete_accepted_expansions(&self) -> Result<(u64, u64)> {
        self.touch();
        Ok((0, 0))
    }

    async fn pending_counts(&self, _workspace_type: &str) -> Result<PendingCounts> {
        self.touch();
        let synced = self.synced.lock().unwrap().clone();
        let tags = self
            .tags
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !synced.contains(&t.id))
            .count() as i64;
        Ok(PendingCounts {
            tags,
            ..Default::default()
        })
    }
}
