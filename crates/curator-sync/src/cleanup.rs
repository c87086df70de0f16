//! Removal of expansion proposals the cloud has accepted.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use curator_core::{Result, SyncStore};

/// Rows deleted by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub dimension_expansions: u64,
    pub tag_expansions: u64,
}

/// Deletes proposals that have round-tripped into the canonical tables.
///
/// A dimension proposal is accepted once a synced dimension with the same name
/// exists; a tag proposal once a synced tag with the same name exists under a
/// dimension of the proposal's dimension name.
#[derive(Clone)]
pub struct ExpansionCleanup {
    store: Arc<dyn SyncStore>,
}

impl ExpansionCleanup {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self) -> Result<CleanupReport> {
        let (dimension_expansions, tag_expansions) =
            self.store.delete_accepted_expansions().await?;

        if dimension_expansions + tag_expansions > 0 {
            info!(
                subsystem = "sync",
                component = "cleanup",
                op = "cleanup",
                dimension_expansions,
                tag_expansions,
                "Deleted accepted expansion proposals"
            );
        }

        Ok(CleanupReport {
            dimension_expansions,
            tag_expansions,
        })
    }
}
