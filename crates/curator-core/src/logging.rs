//! Structured logging field name constants.
//!
//! All crates use these names for `tracing` fields so that log queries can
//! filter by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Cycle aborted, record stuck past the escalation threshold |
//! | WARN  | Recoverable issue: mapping miss, stale cache kept |
//! | INFO  | Lifecycle events, phase uploads, cycle completion |
//! | DEBUG | Gate decisions, selection sizes |
//! | TRACE | Per-record remapping |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "sync", "db", "cloud", "daemon"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "scheduler", "identifier_cache", "phase_executor", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "refresh", "batch_sync", "cleanup"
pub const OPERATION: &str = "op";

/// UUIDv7 correlating all events of one sync cycle.
pub const CYCLE_ID: &str = "cycle_id";

/// Pipeline phase name.
pub const PHASE: &str = "phase";

/// Language of the cloud call.
pub const LANGUAGE: &str = "language";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records included in an upload.
pub const UPLOADED: &str = "uploaded";

/// Number of records skipped for a mapping miss.
pub const SKIPPED: &str = "skipped";

/// Number of rows deleted.
pub const DELETED: &str = "deleted";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Remaining cooldown in seconds.
pub const COOLDOWN_SECS: &str = "cooldown_secs";
