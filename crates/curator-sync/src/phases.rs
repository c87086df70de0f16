//! The per-cycle upload pipeline.
//!
//! One cycle walks `Dimensions → Tags → FilesRelations → Expansions → Cleanup`.
//! Each state commits independently: a later failure never rolls back status
//! writes of an earlier state. The remapping and payload builders are free
//! functions over an [`IdentifierSnapshot`] so they can be tested without a
//! store or a cloud.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use curator_core::{
    CloudDimension, CloudFile, CloudService, CloudTag, CloudTagExpansion, CloudTagRelation,
    FileRecord, FileTagRelation, Result, SyncPayload, SyncStore, TagExpansion, TagRecord,
};

use crate::cleanup::ExpansionCleanup;
use crate::config::SyncConfig;
use crate::identifier_cache::{IdentifierCache, IdentifierSnapshot};
use crate::miss_ledger::{MissKey, MissLedger};
use crate::selector::{BatchSelector, DefinitionBatch};

// =============================================================================
// PHASES
// =============================================================================

/// States of one cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Dimensions,
    Tags,
    FilesRelations,
    Expansions,
    Cleanup,
    Done,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Dimensions => Phase::Tags,
            Phase::Tags => Phase::FilesRelations,
            Phase::FilesRelations => Phase::Expansions,
            Phase::Expansions => Phase::Cleanup,
            Phase::Cleanup | Phase::Done => Phase::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Dimensions => "dimensions",
            Phase::Tags => "tags",
            Phase::FilesRelations => "files_relations",
            Phase::Expansions => "expansions",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub dimensions_uploaded: usize,
    pub tags_uploaded: usize,
    pub tags_skipped: usize,
    pub files_uploaded: usize,
    pub relations_uploaded: usize,
    pub relations_skipped: usize,
    pub dimension_expansions_uploaded: usize,
    pub tag_expansions_uploaded: usize,
    pub tag_expansions_suppressed: usize,
    pub dimension_expansions_deleted: u64,
    pub tag_expansions_deleted: u64,
    /// Number of `batch_sync` calls made.
    pub upload_calls: usize,
    /// Records stuck pending past the miss threshold.
    pub escalated: Vec<MissKey>,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            ..Default::default()
        }
    }

    /// True when the cycle talked to the cloud only to read.
    pub fn is_noop(&self) -> bool {
        self.upload_calls == 0
    }
}

// =============================================================================
// PAYLOAD BUILDERS
// =============================================================================

/// Records resolved against the cloud id space.
#[derive(Debug, Clone, PartialEq)]
pub struct Remapped<T> {
    /// Records ready for upload.
    pub records: Vec<T>,
    /// Local ids of every row represented in `records`.
    pub local_ids: Vec<i64>,
    /// Local ids left unresolved.
    pub missed: Vec<i64>,
}

impl<T> Default for Remapped<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            local_ids: Vec::new(),
            missed: Vec::new(),
        }
    }
}

/// Dimension records for the given tags, one per dimension name.
pub fn build_dimension_payload(tags: &[TagRecord]) -> Result<Vec<CloudDimension>> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|t| seen.insert(t.dimension.name.as_str()))
        .map(|t| t.dimension.to_cloud())
        .collect()
}

/// Tag records with their dimension remapped to the cloud id.
pub fn remap_tags(tags: &[TagRecord], snapshot: &IdentifierSnapshot) -> Remapped<CloudTag> {
    let mut out = Remapped::default();
    for tag in tags {
        match snapshot.dimension_id(&tag.dimension.name) {
            Some(dimension_id) => {
                out.records.push(CloudTag {
                    name: tag.name.clone(),
                    dimension_id,
                    created_at: tag.created_at,
                });
                out.local_ids.push(tag.id);
            }
            None => out.missed.push(tag.id),
        }
    }
    out
}

/// File records keyed by content hash; duplicates collapse to one record.
pub fn build_file_payload(files: &[FileRecord]) -> Result<Vec<CloudFile>> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|f| seen.insert(f.content_hash.as_str()))
        .map(FileRecord::to_cloud)
        .collect()
}

/// Relations remapped to `(content hash, cloud tag id)`.
///
/// Relations of files sharing a hash collapse to one record but all of their
/// local ids are reported, so every local row gets marked.
pub fn remap_relations(
    relations: &[FileTagRelation],
    snapshot: &IdentifierSnapshot,
) -> Remapped<CloudTagRelation> {
    let mut out = Remapped::default();
    let mut seen = HashSet::new();
    for relation in relations {
        match snapshot.resolve_tag(&relation.dimension_name, &relation.tag_name) {
            Some(tag_id) => {
                let record = CloudTagRelation {
                    file_hash: relation.file_hash.clone(),
                    tag_id,
                };
                if seen.insert(record.clone()) {
                    out.records.push(record);
                }
                out.local_ids.push(relation.id);
            }
            None => out.missed.push(relation.id),
        }
    }
    out
}

/// Split off tag proposals under generic dimensions: `(suppressed, remaining)`.
pub fn partition_tag_expansions(
    expansions: Vec<TagExpansion>,
    pan_dimension_ids: &HashSet<i64>,
) -> (Vec<TagExpansion>, Vec<TagExpansion>) {
    expansions
        .into_iter()
        .partition(|e| pan_dimension_ids.contains(&e.dimension_id))
}

/// Tag proposals with the cloud dimension id, or the local id when the
/// dimension cannot be resolved.
pub fn remap_tag_expansions(
    expansions: &[TagExpansion],
    snapshot: &IdentifierSnapshot,
) -> Vec<CloudTagExpansion> {
    expansions
        .iter()
        .map(|e| {
            let resolved = e
                .dimension_name
                .as_deref()
                .and_then(|name| snapshot.dimension_id(name));
            if resolved.is_none() {
                debug!(
                    subsystem = "sync",
                    component = "phase_executor",
                    expansion_id = e.id,
                    dimension_id = e.dimension_id,
                    "Tag expansion dimension unresolved, sending local id"
                );
            }
            CloudTagExpansion {
                dimension_id: resolved.map_or(e.dimension_id, |id| id.0),
                tag_name: e.tag_name.clone(),
                reason: e.reason.clone(),
                created_at: e.created_at,
            }
        })
        .collect()
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Data carried between the states of one cycle.
struct CycleState {
    definitions: DefinitionBatch,
    /// Records skipped for a mapping miss in this cycle.
    missed: HashSet<MissKey>,
    report: CycleReport,
}

/// Runs the upload pipeline against a store and a cloud.
pub struct PhaseExecutor {
    store: Arc<dyn SyncStore>,
    cloud: Arc<dyn CloudService>,
    cache: Arc<IdentifierCache>,
    selector: BatchSelector,
    cleanup: ExpansionCleanup,
    language: String,
    pan_dimension_ids: HashSet<i64>,
    ledger: Mutex<MissLedger>,
}

impl PhaseExecutor {
    pub fn new(
        store: Arc<dyn SyncStore>,
        cloud: Arc<dyn CloudService>,
        cache: Arc<IdentifierCache>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            selector: BatchSelector::new(
                store.clone(),
                config.workspace_type.clone(),
                config.batch_size,
            ),
            cleanup: ExpansionCleanup::new(store.clone()),
            store,
            cloud,
            cache,
            language: config.language.clone(),
            pan_dimension_ids: config.pan_dimension_ids.clone(),
            ledger: Mutex::new(MissLedger::new(config.miss_escalation_threshold)),
        }
    }

    /// Run every phase in order. The first error aborts the cycle.
    pub async fn run_cycle(&self, cycle_id: Uuid) -> Result<CycleReport> {
        let started = Instant::now();
        let mut state = CycleState {
            definitions: DefinitionBatch::default(),
            missed: HashSet::new(),
            report: CycleReport::new(cycle_id),
        };

        let mut phase = Phase::Dimensions;
        while phase != Phase::Done {
            debug!(
                subsystem = "sync",
                component = "phase_executor",
                cycle_id = %cycle_id,
                phase = %phase,
                "Entering phase"
            );
            self.run_phase(phase, &mut state).await?;
            phase = phase.next();
        }

        let mut ledger = self.ledger.lock().await;
        ledger.end_cycle(&state.missed);
        state.report.escalated = ledger.escalated();
        drop(ledger);
        state.report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(state.report)
    }

    async fn run_phase(&self, phase: Phase, state: &mut CycleState) -> Result<()> {
        match phase {
            Phase::Dimensions => self.sync_dimensions(state).await,
            Phase::Tags => self.sync_tags(state).await,
            Phase::FilesRelations => self.sync_files_and_relations(state).await,
            Phase::Expansions => self.sync_expansions(state).await,
            Phase::Cleanup => self.run_cleanup(state).await,
            Phase::Done => Ok(()),
        }
    }

    async fn sync_dimensions(&self, state: &mut CycleState) -> Result<()> {
        let batch = self.selector.select_definitions().await?;
        let dimensions = build_dimension_payload(&batch.tags)?;
        state.definitions = batch;

        if dimensions.is_empty() {
            return Ok(());
        }
        let uploaded = dimensions.len();
        self.upload(SyncPayload::dimensions(dimensions), Phase::Dimensions, state)
            .await?;
        state.report.dimensions_uploaded = uploaded;
        self.cache.refresh(self.cloud.as_ref(), &self.language).await;
        Ok(())
    }

    async fn sync_tags(&self, state: &mut CycleState) -> Result<()> {
        if state.definitions.tags.is_empty() {
            return Ok(());
        }
        let snapshot = self.current_snapshot().await;
        let remapped = remap_tags(&state.definitions.tags, &snapshot);

        for tag in state
            .definitions
            .tags
            .iter()
            .filter(|t| remapped.missed.contains(&t.id))
        {
            warn!(
                subsystem = "sync",
                component = "phase_executor",
                phase = "tags",
                tag_id = tag.id,
                tag = %tag.name,
                dimension = %tag.dimension.name,
                "Tag dimension has no cloud id, skipping"
            );
        }
        state.report.tags_skipped = remapped.missed.len();
        self.record_misses(remapped.missed.iter().map(|id| MissKey::Tag(*id)), state)
            .await;

        if remapped.records.is_empty() {
            return Ok(());
        }
        let uploaded = remapped.records.len();
        self.upload(SyncPayload::tags(remapped.records), Phase::Tags, state)
            .await?;
        self.store.mark_tags_synced(&remapped.local_ids).await?;
        self.clear_misses(remapped.local_ids.iter().map(|id| MissKey::Tag(*id)))
            .await;
        state.report.tags_uploaded = uploaded;
        self.cache.refresh(self.cloud.as_ref(), &self.language).await;
        Ok(())
    }

    async fn sync_files_and_relations(&self, state: &mut CycleState) -> Result<()> {
        let files = build_file_payload(&state.definitions.files)?;
        let relations = self
            .selector
            .select_relations(&state.definitions.files)
            .await?;
        if files.is_empty() && relations.is_empty() {
            return Ok(());
        }

        let snapshot = self.current_snapshot().await;
        let remapped = remap_relations(&relations, &snapshot);
        for relation in relations.iter().filter(|r| remapped.missed.contains(&r.id)) {
            warn!(
                subsystem = "sync",
                component = "phase_executor",
                phase = "files_relations",
                relation_id = relation.id,
                tag = %format!("{}/{}", relation.dimension_name, relation.tag_name),
                "Relation tag has no cloud id, skipping"
            );
        }
        state.report.relations_skipped = remapped.missed.len();
        self.record_misses(
            remapped.missed.iter().map(|id| MissKey::Relation(*id)),
            state,
        )
        .await;

        if files.is_empty() && remapped.records.is_empty() {
            return Ok(());
        }
        let file_count = files.len();
        let relation_count = remapped.records.len();
        self.upload(
            SyncPayload::files_and_relations(files, remapped.records),
            Phase::FilesRelations,
            state,
        )
        .await?;

        let file_ids: Vec<i64> = state.definitions.files.iter().map(|f| f.id).collect();
        self.store
            .mark_files_and_relations_synced(&file_ids, &remapped.local_ids)
            .await?;
        self.clear_misses(remapped.local_ids.iter().map(|id| MissKey::Relation(*id)))
            .await;

        state.report.files_uploaded = file_count;
        state.report.relations_uploaded = relation_count;
        Ok(())
    }

    async fn sync_expansions(&self, state: &mut CycleState) -> Result<()> {
        let batch = self.selector.select_expansions().await?;
        let (suppressed, remaining) =
            partition_tag_expansions(batch.tags, &self.pan_dimension_ids);

        if !suppressed.is_empty() {
            let ids: Vec<i64> = suppressed.iter().map(|e| e.id).collect();
            self.store.mark_tag_expansions_synced(&ids).await?;
            info!(
                subsystem = "sync",
                component = "phase_executor",
                phase = "expansions",
                skipped = ids.len(),
                "Tag expansions under generic dimensions marked synced without upload"
            );
            state.report.tag_expansions_suppressed = ids.len();
        }

        if batch.dimensions.is_empty() && remaining.is_empty() {
            return Ok(());
        }

        let snapshot = self.current_snapshot().await;
        let dimensions = batch.dimensions.iter().map(|d| d.to_cloud()).collect();
        let tags = remap_tag_expansions(&remaining, &snapshot);
        self.upload(
            SyncPayload::expansions(dimensions, tags),
            Phase::Expansions,
            state,
        )
        .await?;

        let dimension_ids: Vec<i64> = batch.dimensions.iter().map(|d| d.id).collect();
        let tag_ids: Vec<i64> = remaining.iter().map(|e| e.id).collect();
        if !dimension_ids.is_empty() {
            self.store
                .mark_dimension_expansions_synced(&dimension_ids)
                .await?;
        }
        if !tag_ids.is_empty() {
            self.store.mark_tag_expansions_synced(&tag_ids).await?;
        }
        state.report.dimension_expansions_uploaded = dimension_ids.len();
        state.report.tag_expansions_uploaded = tag_ids.len();
        Ok(())
    }

    async fn run_cleanup(&self, state: &mut CycleState) -> Result<()> {
        let deleted = self.cleanup.run().await?;
        state.report.dimension_expansions_deleted = deleted.dimension_expansions;
        state.report.tag_expansions_deleted = deleted.tag_expansions;
        Ok(())
    }

    /// Snapshot after retrying any refresh that failed earlier.
    async fn current_snapshot(&self) -> Arc<IdentifierSnapshot> {
        self.cache
            .ensure_fresh(self.cloud.as_ref(), &self.language)
            .await;
        self.cache.snapshot().await
    }

    async fn upload(&self, payload: SyncPayload, phase: Phase, state: &mut CycleState) -> Result<()> {
        let records = payload.record_count();
        self.cloud.batch_sync(&payload, &self.language).await?;
        state.report.upload_calls += 1;
        info!(
            subsystem = "sync",
            component = "phase_executor",
            op = "batch_sync",
            cycle_id = %state.report.cycle_id,
            phase = %phase,
            uploaded = records,
            "Batch uploaded"
        );
        Ok(())
    }

    async fn record_misses(&self, keys: impl Iterator<Item = MissKey>, state: &mut CycleState) {
        let mut ledger = self.ledger.lock().await;
        for key in keys {
            state.missed.insert(key);
            if let Some(misses) = ledger.record_miss(key) {
                error!(
                    subsystem = "sync",
                    component = "phase_executor",
                    record = %key,
                    misses,
                    "Record still unresolved after repeated cycles, left pending"
                );
            }
        }
    }

    async fn clear_misses(&self, keys: impl Iterator<Item = MissKey>) {
        self.ledger.lock().await.clear(keys);
    }

    /// Consecutive misses recorded for a row.
    pub async fn misses(&self, key: MissKey) -> u32 {
        self.ledger.lock().await.misses(key)
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}
