//! In-memory cloud service for deterministic testing.
//!
//! Behaves like the real service: dimensions and tags uploaded through
//! `batch_sync` are assigned fresh cloud ids (deliberately offset from any
//! local id space) and show up in subsequent `fetch_*` calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use curator_cloud::mock::{MockCloudService, MockFailure};
//!
//! let cloud = MockCloudService::new();
//! cloud.seed_dimension("topic");
//! cloud.fail_batches(MockFailure::PermissionDenied);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use curator_core::{
    CloudId, CloudService, CloudTagRelation, Error, RemoteDimension, RemoteTag, Result,
    SyncPayload,
};

/// First id handed out by the mock, far from small local row ids.
const FIRST_CLOUD_ID: i64 = 1000;

/// Failure injected into mock calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Row-level-security rejection (`42501`).
    PermissionDenied,
    /// Generic 5xx failure.
    Server,
}

impl MockFailure {
    fn to_error(self) -> Error {
        match self {
            MockFailure::PermissionDenied => Error::Cloud {
                status: 401,
                code: Some(curator_core::error::PERMISSION_DENIED_CODE.to_string()),
                message: "permission denied for table tags".to_string(),
            },
            MockFailure::Server => Error::Cloud {
                status: 503,
                code: None,
                message: "service unavailable".to_string(),
            },
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone)]
pub enum MockCall {
    FetchDimensions { language: String },
    FetchTags { language: String },
    BatchSync { payload: SyncPayload, language: String },
}

#[derive(Debug, Default)]
struct MockState {
    next_id: i64,
    dimensions: BTreeMap<String, CloudId>,
    tags: BTreeMap<(CloudId, String), CloudId>,
    files: HashSet<String>,
    relations: HashSet<CloudTagRelation>,
    /// Dimension names the service accepts but never materializes.
    swallowed_dimensions: HashSet<String>,
    batch_failure: Option<MockFailure>,
    /// Failure for batches carrying `files` or `tag_relations` only.
    file_batch_failure: Option<MockFailure>,
    fetch_failure: Option<MockFailure>,
    calls: Vec<MockCall>,
}

impl MockState {
    fn allocate(&mut self) -> CloudId {
        if self.next_id == 0 {
            self.next_id = FIRST_CLOUD_ID;
        }
        let id = CloudId(self.next_id);
        self.next_id += 1;
        id
    }

    fn upsert_dimension(&mut self, name: &str) -> CloudId {
        if let Some(id) = self.dimensions.get(name) {
            return *id;
        }
        let id = self.allocate();
        self.dimensions.insert(name.to_string(), id);
        id
    }

    fn upsert_tag(&mut self, dimension_id: CloudId, name: &str) -> CloudId {
        let key = (dimension_id, name.to_string());
        if let Some(id) = self.tags.get(&key) {
            return *id;
        }
        let id = self.allocate();
        self.tags.insert(key, id);
        id
    }
}

/// In-memory [`CloudService`].
#[derive(Clone, Default)]
pub struct MockCloudService {
    state: Arc<Mutex<MockState>>,
}

impl MockCloudService {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pre-populate a dimension, returning its cloud id.
    pub fn seed_dimension(&self, name: &str) -> CloudId {
        self.state().upsert_dimension(name)
    }

    /// Pre-populate a tag, returning its cloud id.
    pub fn seed_tag(&self, dimension_id: CloudId, name: &str) -> CloudId {
        self.state().upsert_tag(dimension_id, name)
    }

    /// Accept uploads of this dimension without ever creating it.
    pub fn swallow_dimension(&self, name: &str) {
        self.state().swallowed_dimensions.insert(name.to_string());
    }

    /// Make every `batch_sync` fail until cleared.
    pub fn fail_batches(&self, failure: MockFailure) {
        self.state().batch_failure = Some(failure);
    }

    /// Fail only batches that carry files or relations, until cleared.
    pub fn fail_file_batches(&self, failure: MockFailure) {
        self.state().file_batch_failure = Some(failure);
    }

    /// Make every `fetch_*` fail until cleared.
    pub fn fail_fetches(&self, failure: MockFailure) {
        self.state().fetch_failure = Some(failure);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.batch_failure = None;
        state.file_batch_failure = None;
        state.fetch_failure = None;
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Payloads of recorded `batch_sync` calls, failed ones included.
    pub fn batch_payloads(&self) -> Vec<SyncPayload> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::BatchSync { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn dimension_id(&self, name: &str) -> Option<CloudId> {
        self.state().dimensions.get(name).copied()
    }

    pub fn tag_id(&self, dimension_id: CloudId, name: &str) -> Option<CloudId> {
        self.state()
            .tags
            .get(&(dimension_id, name.to_string()))
            .copied()
    }

    /// Content hashes of files accepted so far.
    pub fn file_hashes(&self) -> HashSet<String> {
        self.state().files.clone()
    }

    pub fn relations(&self) -> HashSet<CloudTagRelation> {
        self.state().relations.clone()
    }
}

#[async_trait]
impl CloudService for MockCloudService {
    async fn fetch_dimensions(&self, language: &str) -> Result<Vec<RemoteDimension>> {
        let mut state = self.state();
        state.calls.push(MockCall::FetchDimensions {
            language: language.to_string(),
        });
        if let Some(failure) = state.fetch_failure {
            return Err(failure.to_error());
        }
        Ok(state
            .dimensions
            .iter()
            .map(|(name, id)| RemoteDimension {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn fetch_tags(&self, language: &str) -> Result<Vec<RemoteTag>> {
        let mut state = self.state();
        state.calls.push(MockCall::FetchTags {
            language: language.to_string(),
        });
        if let Some(failure) = state.fetch_failure {
            return Err(failure.to_error());
        }
        Ok(state
            .tags
            .iter()
            .map(|((dimension_id, name), id)| RemoteTag {
                id: *id,
                name: name.clone(),
                dimension_id: *dimension_id,
            })
            .collect())
    }

    async fn batch_sync(&self, payload: &SyncPayload, language: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::BatchSync {
            payload: payload.clone(),
            language: language.to_string(),
        });
        if let Some(failure) = state.batch_failure {
            return Err(failure.to_error());
        }
        if let Some(failure) = state.file_batch_failure {
            if payload.files.is_some() || payload.tag_relations.is_some() {
                return Err(failure.to_error());
            }
        }

        // Validate tag references first so the call stays atomic.
        let known: HashSet<CloudId> = state.dimensions.values().copied().collect();
        if let Some(tags) = &payload.tags {
            if let Some(bad) = tags.iter().find(|t| !known.contains(&t.dimension_id)) {
                return Err(Error::Cloud {
                    status: 409,
                    code: Some("23503".to_string()),
                    message: format!("unknown dimension_id {} for tag {}", bad.dimension_id, bad.name),
                });
            }
        }

        for dimension in payload.dimensions.iter().flatten() {
            if !state.swallowed_dimensions.contains(&dimension.name) {
                state.upsert_dimension(&dimension.name);
            }
        }
        for tag in payload.tags.iter().flatten() {
            state.upsert_tag(tag.dimension_id, &tag.name);
        }
        for file in payload.files.iter().flatten() {
            state.files.insert(file.file_hash.clone());
        }
        for relation in payload.tag_relations.iter().flatten() {
            state.relations.insert(relation.clone());
        }
        Ok(())
    }
}
