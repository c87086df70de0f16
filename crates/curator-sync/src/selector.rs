//! Bounded selection of pending rows for one cycle.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use curator_core::{
    DimensionExpansion, FileRecord, FileTagRelation, Result, SyncStore, TagExpansion, TagRecord,
};

/// Phase 1 input: the file batch plus every tag it needs.
#[derive(Debug, Clone, Default)]
pub struct DefinitionBatch {
    pub files: Vec<FileRecord>,
    /// Tags referenced by `files` and pending tags, unique by id.
    pub tags: Vec<TagRecord>,
}

/// Phase 3 input.
#[derive(Debug, Clone, Default)]
pub struct ExpansionBatch {
    pub dimensions: Vec<DimensionExpansion>,
    pub tags: Vec<TagExpansion>,
}

impl ExpansionBatch {
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.tags.is_empty()
    }
}

/// Reads pending rows, at most `batch_size` per entity kind.
#[derive(Clone)]
pub struct BatchSelector {
    store: Arc<dyn SyncStore>,
    workspace_type: String,
    batch_size: i64,
}

impl BatchSelector {
    pub fn new(store: Arc<dyn SyncStore>, workspace_type: impl Into<String>, batch_size: i64) -> Self {
        Self {
            store,
            workspace_type: workspace_type.into(),
            batch_size,
        }
    }

    /// Pending analyzed files, the tags they reference, and pending tags.
    pub async fn select_definitions(&self) -> Result<DefinitionBatch> {
        let files = self
            .store
            .pending_files(&self.workspace_type, self.batch_size)
            .await?;
        let file_ids: Vec<i64> = files.iter().map(|f| f.id).collect();

        let referenced = if file_ids.is_empty() {
            Vec::new()
        } else {
            self.store.tags_for_files(&file_ids).await?
        };
        let pending = self.store.pending_tags(self.batch_size).await?;
        let tags = union_by_id(referenced, pending, |t| t.id);

        debug!(
            subsystem = "sync",
            component = "selector",
            files = files.len(),
            tags = tags.len(),
            "Selected definitions"
        );
        Ok(DefinitionBatch { files, tags })
    }

    /// Relations of this cycle's files plus pending relations left behind by
    /// files that synced earlier.
    pub async fn select_relations(&self, files: &[FileRecord]) -> Result<Vec<FileTagRelation>> {
        let file_ids: Vec<i64> = files.iter().map(|f| f.id).collect();
        let current = if file_ids.is_empty() {
            Vec::new()
        } else {
            self.store.relations_for_files(&file_ids).await?
        };
        let leftover = self
            .store
            .pending_relations_of_synced_files(self.batch_size)
            .await?;
        let relations = union_by_id(current, leftover, |r| r.id);

        debug!(
            subsystem = "sync",
            component = "selector",
            relations = relations.len(),
            "Selected relations"
        );
        Ok(relations)
    }

    pub async fn select_expansions(&self) -> Result<ExpansionBatch> {
        let dimensions = self
            .store
            .pending_dimension_expansions(self.batch_size)
            .await?;
        let tags = self.store.pending_tag_expansions(self.batch_size).await?;
        Ok(ExpansionBatch { dimensions, tags })
    }

    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }
}

/// Concatenate two lists, keeping the first occurrence of each id.
pub fn union_by_id<T>(first: Vec<T>, second: Vec<T>, id: impl Fn(&T) -> i64) -> Vec<T> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|item| seen.insert(id(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_by_id_keeps_first() {
        let merged = union_by_id(vec![(1, "a"), (2, "b")], vec![(2, "c"), (3, "d")], |p| p.0);
        assert_eq!(merged, vec![(1, "a"), (2, "b"), (3, "d")]);
    }

    #[test]
    fn test_union_by_id_empty() {
        let merged: Vec<(i64, ())> = union_by_id(vec![], vec![], |p| p.0);
        assert!(merged.is_empty());
    }
}
