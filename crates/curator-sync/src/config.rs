//! Sync engine configuration.

use std::collections::HashSet;
use std::time::Duration;

use curator_core::defaults;
use tracing::warn;

/// Configuration for the sync engine and its scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Language passed to every cloud call.
    pub language: String,
    /// Local dimension ids whose tag proposals skip cloud review.
    pub pan_dimension_ids: HashSet<i64>,
    /// Select the short polling interval.
    pub debug: bool,
    /// Polling interval in seconds.
    pub interval_secs: u64,
    /// Polling interval in seconds when `debug` is set.
    pub debug_interval_secs: u64,
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Workspace kind whose files take part in sync.
    pub workspace_type: String,
    /// Cooldown after a permission-denied failure, in seconds.
    pub backoff_secs: u64,
    /// Maximum rows selected per entity kind in one cycle.
    pub batch_size: i64,
    /// Consecutive mapping misses before a record is escalated.
    pub miss_escalation_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            pan_dimension_ids: HashSet::new(),
            debug: false,
            interval_secs: defaults::SYNC_INTERVAL_SECS,
            debug_interval_secs: defaults::SYNC_DEBUG_INTERVAL_SECS,
            enabled: true,
            workspace_type: defaults::SYNC_WORKSPACE_TYPE.to_string(),
            backoff_secs: defaults::PERMISSION_BACKOFF_SECS,
            batch_size: defaults::BATCH_SIZE,
            miss_escalation_threshold: defaults::MISS_ESCALATION_THRESHOLD,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DEFAULT_LANGUAGE` | `zh-CN` | Language of cloud calls |
    /// | `PAN_DIMENSION_IDS` | empty | Comma-separated generic dimension ids |
    /// | `SYNC_DEBUG` | `false` | Use the debug polling interval |
    /// | `SYNC_INTERVAL_SECS` | `300` | Polling interval |
    /// | `SYNC_DEBUG_INTERVAL_SECS` | `30` | Polling interval in debug mode |
    /// | `SYNC_ENABLED` | `true` | Enable/disable the scheduler |
    /// | `SYNC_WORKSPACE_TYPE` | `autotag` | Workspace kind whose files sync |
    /// | `SYNC_BACKOFF_SECS` | `600` | Permission-denied cooldown |
    /// | `SYNC_MISS_ESCALATION_THRESHOLD` | `5` | Consecutive misses before an ERROR log |
    pub fn from_env() -> Self {
        let base = Self::default();

        let language = std::env::var("DEFAULT_LANGUAGE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(base.language);

        let pan_dimension_ids = std::env::var("PAN_DIMENSION_IDS")
            .map(|v| parse_id_list(&v))
            .unwrap_or_default();

        let debug = std::env::var("SYNC_DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let enabled = std::env::var("SYNC_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            language,
            pan_dimension_ids,
            debug,
            interval_secs: env_u64("SYNC_INTERVAL_SECS", base.interval_secs).max(1),
            debug_interval_secs: env_u64("SYNC_DEBUG_INTERVAL_SECS", base.debug_interval_secs)
                .max(1),
            enabled,
            workspace_type: std::env::var("SYNC_WORKSPACE_TYPE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(base.workspace_type),
            backoff_secs: env_u64("SYNC_BACKOFF_SECS", base.backoff_secs),
            miss_escalation_threshold: env_u64(
                "SYNC_MISS_ESCALATION_THRESHOLD",
                u64::from(base.miss_escalation_threshold),
            )
            .clamp(1, u64::from(u32::MAX)) as u32,
            ..base
        }
    }

    /// Effective polling interval.
    pub fn poll_interval(&self) -> Duration {
        let secs = if self.debug {
            self.debug_interval_secs
        } else {
            self.interval_secs
        };
        Duration::from_secs(secs.max(1))
    }

    /// Permission-denied cooldown.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_pan_dimension_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.pan_dimension_ids = ids.into_iter().collect();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_workspace_type(mut self, workspace_type: impl Into<String>) -> Self {
        self.workspace_type = workspace_type.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_miss_escalation_threshold(mut self, threshold: u32) -> Self {
        self.miss_escalation_threshold = threshold.max(1);
        self
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated id list, ignoring blanks and logging junk entries.
pub fn parse_id_list(raw: &str) -> HashSet<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(
                    subsystem = "sync",
                    component = "config",
                    entry = s,
                    "Ignoring non-numeric PAN_DIMENSION_IDS entry"
                );
                None
            }
        })
        .collect()
}
