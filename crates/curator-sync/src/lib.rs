//! # curator-sync
//!
//! Cloud reconciliation engine for curator.
//!
//! Pushes locally pending rows to the cloud store while translating between
//! the local and cloud id spaces by name. The pieces:
//!
//! - [`IdentifierCache`]: name-keyed lookup of cloud ids for one language
//! - [`BatchSelector`]: bounded selection of pending rows
//! - [`PhaseExecutor`]: the `Dimensions → Tags → FilesRelations → Expansions
//!   → Cleanup` state machine run once per cycle
//! - [`BackoffController`]: cooldown after permission-denied failures
//! - [`SyncEngine`]: gates and the failure boundary around one cycle
//! - [`SyncScheduler`]: the timer loop driving the engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use curator_sync::{SyncConfig, SyncEngine, SyncScheduler};
//!
//! let engine = Arc::new(SyncEngine::new(store, cloud, probe, SyncConfig::from_env()));
//! let handle = SyncScheduler::new(engine).start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod backoff;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod identifier_cache;
pub mod miss_ledger;
pub mod phases;
pub mod scheduler;
pub mod selector;

pub use backoff::BackoffController;
pub use cleanup::ExpansionCleanup;
pub use config::SyncConfig;
pub use engine::{EngineState, EngineStatus, SkipReason, SyncEngine, SyncEvent, TickOutcome};
pub use identifier_cache::{IdentifierCache, IdentifierSnapshot, TagKey};
pub use miss_ledger::{MissKey, MissLedger};
pub use phases::{CycleReport, Phase, PhaseExecutor};
pub use scheduler::{SchedulerHandle, SyncScheduler, MIN_INTERVAL};
pub use selector::{BatchSelector, DefinitionBatch, ExpansionBatch};
