//! Centralized default constants for the curator sync engine.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// SYNC CYCLE
// =============================================================================

/// Maximum rows selected per entity kind in one cycle.
pub const BATCH_SIZE: i64 = 50;

/// Language used for cloud calls when none is configured.
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

/// Polling interval in production builds (5 minutes).
pub const SYNC_INTERVAL_SECS: u64 = 300;

/// Polling interval when the debug flag is set.
pub const SYNC_DEBUG_INTERVAL_SECS: u64 = 30;

/// Cooldown after a permission-denied failure (10 minutes).
pub const PERMISSION_BACKOFF_SECS: u64 = 600;

/// Workspace kind whose files take part in cloud sync.
pub const SYNC_WORKSPACE_TYPE: &str = "autotag";

/// Consecutive mapping misses before a record is reported as stuck.
pub const MISS_ESCALATION_THRESHOLD: u32 = 5;

/// Scheduler event channel capacity.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// CLOUD SERVICE
// =============================================================================

/// Default cloud service base URL.
pub const CLOUD_BASE_URL: &str = "http://127.0.0.1:54321/rest/v1";

/// Timeout for cloud requests in seconds.
pub const CLOUD_TIMEOUT_SECS: u64 = 30;

/// Timeout for the connectivity probe in seconds.
pub const CONNECTIVITY_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// DATABASE
// =============================================================================

/// Default local database location.
pub const DATABASE_URL: &str = "sqlite://curator.db";

/// Busy timeout for SQLite writers in seconds.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;
