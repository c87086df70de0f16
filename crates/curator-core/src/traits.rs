//! Core traits for the sync engine's collaborators.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// LOCAL STORE
// =============================================================================

/// Local database operations used by the sync engine.
///
/// The engine only reads rows and moves their `sync_status` forward; the one
/// exception is [`SyncStore::delete_accepted_expansions`].
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Pending, analyzed files in workspaces of `workspace_type`, oldest first.
    async fn pending_files(&self, workspace_type: &str, limit: i64) -> Result<Vec<FileRecord>>;

    /// Distinct tags referenced by the given files, regardless of tag status.
    async fn tags_for_files(&self, file_ids: &[i64]) -> Result<Vec<TagRecord>>;

    /// Tags whose own status is pending.
    async fn pending_tags(&self, limit: i64) -> Result<Vec<TagRecord>>;

    /// All relations of the given files.
    async fn relations_for_files(&self, file_ids: &[i64]) -> Result<Vec<FileTagRelation>>;

    /// Pending relations whose file has already been synced.
    async fn pending_relations_of_synced_files(&self, limit: i64)
        -> Result<Vec<FileTagRelation>>;

    async fn pending_dimension_expansions(&self, limit: i64) -> Result<Vec<DimensionExpansion>>;

    async fn pending_tag_expansions(&self, limit: i64) -> Result<Vec<TagExpansion>>;

    async fn mark_tags_synced(&self, ids: &[i64]) -> Result<u64>;

    /// Mark files and relations of one accepted upload together; either both
    /// sets move to `synced` or neither does.
    async fn mark_files_and_relations_synced(
        &self,
        file_ids: &[i64],
        relation_ids: &[i64],
    ) -> Result<(u64, u64)>;

    async fn mark_dimension_expansions_synced(&self, ids: &[i64]) -> Result<u64>;

    async fn mark_tag_expansions_synced(&self, ids: &[i64]) -> Result<u64>;

    /// Delete proposals that reappeared as synced canonical rows.
    ///
    /// Returns `(dimension_expansions_deleted, tag_expansions_deleted)`.
    async fn delete_accepted_expansions(&self) -> Result<(u64, u64)>;

    async fn pending_counts(&self, workspace_type: &str) -> Result<PendingCounts>;
}

// =============================================================================
// CLOUD SERVICE
// =============================================================================

/// Remote service the engine mirrors into.
#[async_trait]
pub trait CloudService: Send + Sync {
    async fn fetch_dimensions(&self, language: &str) -> Result<Vec<RemoteDimension>>;

    async fn fetch_tags(&self, language: &str) -> Result<Vec<RemoteTag>>;

    /// Upload one payload. Success means every included section was accepted.
    async fn batch_sync(&self, payload: &SyncPayload, language: &str) -> Result<()>;
}

// =============================================================================
// CONNECTIVITY
// =============================================================================

/// Host network reachability check consulted before each cycle.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe that always reports connectivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}
