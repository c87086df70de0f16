//! Name-keyed mapping from local entities to cloud identifiers.
//!
//! Local rows never store cloud ids. Dimensions are matched by name and tags by
//! `(cloud dimension id, tag name)`, so every lookup goes through the current
//! [`IdentifierSnapshot`]. A lookup returns `None` when unresolved, which is
//! distinct from resolving to any id value, including `0`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use curator_core::{CloudId, CloudService, RemoteDimension, RemoteTag, Result};

/// Cloud natural key of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKey {
    pub dimension_id: CloudId,
    pub name: String,
}

impl TagKey {
    pub fn new(dimension_id: CloudId, name: impl Into<String>) -> Self {
        Self {
            dimension_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dimension_id, self.name)
    }
}

/// Immutable view of the cloud id maps for one language.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSnapshot {
    dimensions: HashMap<String, CloudId>,
    dimension_names: HashMap<CloudId, String>,
    tags: HashMap<TagKey, CloudId>,
}

impl IdentifierSnapshot {
    /// Build both maps from remote listings.
    pub fn from_remote(dimensions: Vec<RemoteDimension>, tags: Vec<RemoteTag>) -> Self {
        let mut snapshot = Self::default();
        for dimension in dimensions {
            snapshot
                .dimension_names
                .insert(dimension.id, dimension.name.clone());
            snapshot.dimensions.insert(dimension.name, dimension.id);
        }
        for tag in tags {
            snapshot
                .tags
                .insert(TagKey::new(tag.dimension_id, tag.name), tag.id);
        }
        snapshot
    }

    pub fn dimension_id(&self, name: &str) -> Option<CloudId> {
        self.dimensions.get(name).copied()
    }

    /// Reverse lookup of a dimension's name.
    pub fn dimension_name(&self, id: CloudId) -> Option<&str> {
        self.dimension_names.get(&id).map(String::as_str)
    }

    pub fn tag_id(&self, dimension_id: CloudId, name: &str) -> Option<CloudId> {
        self.tags
            .get(&TagKey::new(dimension_id, name))
            .copied()
    }

    /// Resolve a tag from its dimension's name and its own name.
    pub fn resolve_tag(&self, dimension_name: &str, tag_name: &str) -> Option<CloudId> {
        let dimension_id = self.dimension_id(dimension_name)?;
        self.tag_id(dimension_id, tag_name)
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    snapshot: Arc<IdentifierSnapshot>,
    language: Option<String>,
    initialized: bool,
    needs_refresh: bool,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Process-wide identifier cache owned by the engine.
///
/// Refreshes replace both maps wholesale. A failed refresh keeps the previous
/// maps and flags the cache so [`IdentifierCache::ensure_fresh`] retries.
#[derive(Debug, Default)]
pub struct IdentifierCache {
    inner: RwLock<CacheInner>,
}

impl IdentifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fixed snapshot, marked initialized for `language`.
    pub fn with_snapshot(snapshot: IdentifierSnapshot, language: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                snapshot: Arc::new(snapshot),
                language: Some(language.into()),
                initialized: true,
                needs_refresh: false,
                refreshed_at: Some(Utc::now()),
            }),
        }
    }

    /// Rebuild both maps from the cloud. Never fails; returns whether the
    /// refresh succeeded.
    pub async fn refresh(&self, cloud: &dyn CloudService, language: &str) -> bool {
        match Self::fetch(cloud, language).await {
            Ok(snapshot) => {
                let dimensions = snapshot.dimension_count();
                let tags = snapshot.tag_count();
                let mut inner = self.inner.write().await;
                inner.snapshot = Arc::new(snapshot);
                inner.language = Some(language.to_string());
                inner.initialized = true;
                inner.needs_refresh = false;
                inner.refreshed_at = Some(Utc::now());
                drop(inner);

                info!(
                    subsystem = "sync",
                    component = "identifier_cache",
                    op = "refresh",
                    language,
                    dimensions,
                    tags,
                    "Identifier cache refreshed"
                );
                true
            }
            Err(e) => {
                self.inner.write().await.needs_refresh = true;
                warn!(
                    subsystem = "sync",
                    component = "identifier_cache",
                    op = "refresh",
                    language,
                    error = %e,
                    "Identifier cache refresh failed, keeping previous maps"
                );
                false
            }
        }
    }

    async fn fetch(cloud: &dyn CloudService, language: &str) -> Result<IdentifierSnapshot> {
        let dimensions = cloud.fetch_dimensions(language).await?;
        let tags = cloud.fetch_tags(language).await?;
        Ok(IdentifierSnapshot::from_remote(dimensions, tags))
    }

    /// Initialize on first use, or after the active language changed.
    pub async fn ensure_initialized(&self, cloud: &dyn CloudService, language: &str) -> bool {
        let needed = {
            let inner = self.inner.read().await;
            !inner.initialized || inner.language.as_deref() != Some(language)
        };
        if !needed {
            return true;
        }
        debug!(
            subsystem = "sync",
            component = "identifier_cache",
            language,
            "Initializing identifier cache"
        );
        self.refresh(cloud, language).await
    }

    /// Retry a refresh that failed earlier; no-op when the cache is current.
    pub async fn ensure_fresh(&self, cloud: &dyn CloudService, language: &str) {
        let needed = {
            let inner = self.inner.read().await;
            inner.needs_refresh || inner.language.as_deref() != Some(language)
        };
        if needed {
            self.refresh(cloud, language).await;
        }
    }

    /// Current maps. Cheap: shares the underlying snapshot.
    pub async fn snapshot(&self) -> Arc<IdentifierSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.initialized
    }

    pub async fn needs_refresh(&self) -> bool {
        self.inner.read().await.needs_refresh
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.refreshed_at
    }
}
