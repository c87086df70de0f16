//! Long-lived sync engine: gates, failure boundary, and status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use curator_core::{defaults, CloudService, ConnectivityProbe, PendingCounts, Result, SyncStore};

use crate::backoff::BackoffController;
use crate::config::SyncConfig;
use crate::identifier_cache::IdentifierCache;
use crate::phases::{CycleReport, PhaseExecutor};

/// Why a tick did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Another cycle is still running.
    AlreadyRunning,
    /// A permission-denied cooldown is active.
    Backoff { remaining: Duration },
    /// The host reports no connectivity.
    Offline,
}

/// Result of one `try_sync` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Completed(CycleReport),
    Failed {
        cycle_id: Uuid,
        error: String,
        permission_denied: bool,
    },
}

/// Event emitted by the engine and its scheduler.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Scheduler loop started.
    SchedulerStarted,
    /// All gates passed; a cycle is starting.
    CycleStarted { cycle_id: Uuid },
    /// A cycle ran to completion.
    CycleCompleted { report: CycleReport },
    /// A cycle aborted.
    CycleFailed {
        cycle_id: Uuid,
        error: String,
        permission_denied: bool,
    },
    /// A tick was suppressed by a gate.
    CycleSkipped { reason: SkipReason },
    /// Scheduler loop stopped.
    SchedulerStopped,
}

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Backoff,
}

/// Point-in-time engine status.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub cooldown_remaining: Option<Duration>,
    pub cache_ready: bool,
    pub pending: PendingCounts,
}

/// Clears the syncing flag when the cycle ends, however it ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl<'a> SyncingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the identifier cache and gate state; constructed once per process.
pub struct SyncEngine {
    store: Arc<dyn SyncStore>,
    cloud: Arc<dyn CloudService>,
    probe: Arc<dyn ConnectivityProbe>,
    cache: Arc<IdentifierCache>,
    executor: PhaseExecutor,
    backoff: BackoffController,
    syncing: AtomicBool,
    config: SyncConfig,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        cloud: Arc<dyn CloudService>,
        probe: Arc<dyn ConnectivityProbe>,
        config: SyncConfig,
    ) -> Self {
        Self::with_cache(store, cloud, probe, Arc::new(IdentifierCache::new()), config)
    }

    /// Build with a pre-populated identifier cache.
    pub fn with_cache(
        store: Arc<dyn SyncStore>,
        cloud: Arc<dyn CloudService>,
        probe: Arc<dyn ConnectivityProbe>,
        cache: Arc<IdentifierCache>,
        config: SyncConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_CHANNEL_CAPACITY);
        Self {
            executor: PhaseExecutor::new(store.clone(), cloud.clone(), cache.clone(), &config),
            backoff: BackoffController::new(config.backoff()),
            store,
            cloud,
            probe,
            cache,
            syncing: AtomicBool::new(false),
            config,
            event_tx,
        }
    }

    /// Run one cycle unless a gate suppresses it. Never returns an error:
    /// failures are logged, classified, and reported in the outcome.
    pub async fn try_sync(&self) -> TickOutcome {
        // Gate 1: one cycle at a time
        let Some(_guard) = SyncingGuard::acquire(&self.syncing) else {
            return self.skip(SkipReason::AlreadyRunning);
        };

        // Gate 2: permission-denied cooldown
        if let Some(remaining) = self.backoff.remaining() {
            return self.skip(SkipReason::Backoff { remaining });
        }

        // Gate 3: connectivity
        if !self.probe.is_online().await {
            return self.skip(SkipReason::Offline);
        }

        // Gate 4: cache readiness; proceed with empty maps on failure
        if !self
            .cache
            .ensure_initialized(self.cloud.as_ref(), &self.config.language)
            .await
        {
            warn!(
                subsystem = "sync",
                component = "engine",
                language = %self.config.language,
                "Identifier cache unavailable, syncing with empty maps"
            );
        }

        let cycle_id = Uuid::now_v7();
        let _ = self.event_tx.send(SyncEvent::CycleStarted { cycle_id });
        info!(
            subsystem = "sync",
            component = "engine",
            cycle_id = %cycle_id,
            language = %self.config.language,
            "Sync cycle started"
        );

        match self.executor.run_cycle(cycle_id).await {
            Ok(report) => {
                info!(
                    subsystem = "sync",
                    component = "engine",
                    cycle_id = %cycle_id,
                    uploads = report.upload_calls,
                    tags = report.tags_uploaded,
                    files = report.files_uploaded,
                    relations = report.relations_uploaded,
                    skipped = report.tags_skipped + report.relations_skipped,
                    escalated = report.escalated.len(),
                    duration_ms = report.duration_ms,
                    "Sync cycle completed"
                );
                let _ = self.event_tx.send(SyncEvent::CycleCompleted {
                    report: report.clone(),
                });
                TickOutcome::Completed(report)
            }
            Err(e) => {
                let permission_denied = self.backoff.record_failure(&e);
                error!(
                    subsystem = "sync",
                    component = "engine",
                    cycle_id = %cycle_id,
                    permission_denied,
                    error = %e,
                    "Sync cycle failed"
                );
                let error = e.to_string();
                let _ = self.event_tx.send(SyncEvent::CycleFailed {
                    cycle_id,
                    error: error.clone(),
                    permission_denied,
                });
                TickOutcome::Failed {
                    cycle_id,
                    error,
                    permission_denied,
                }
            }
        }
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        debug!(
            subsystem = "sync",
            component = "engine",
            reason = ?reason,
            "Sync tick skipped"
        );
        let _ = self.event_tx.send(SyncEvent::CycleSkipped {
            reason: reason.clone(),
        });
        TickOutcome::Skipped(reason)
    }

    /// Current state, cooldown, cache readiness and pending row counts.
    pub async fn status(&self) -> Result<EngineStatus> {
        let cooldown_remaining = self.backoff.remaining();
        let state = if self.syncing.load(Ordering::Acquire) {
            EngineState::Running
        } else if cooldown_remaining.is_some() {
            EngineState::Backoff
        } else {
            EngineState::Idle
        };
        Ok(EngineStatus {
            state,
            cooldown_remaining,
            cache_ready: self.cache.is_initialized().await,
            pending: self.store.pending_counts(&self.config.workspace_type).await?,
        })
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Subscribe to engine events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> &broadcast::Sender<SyncEvent> {
        &self.event_tx
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        &self.cache
    }

    pub fn backoff(&self) -> &BackoffController {
        &self.backoff
    }

    pub fn executor(&self) -> &PhaseExecutor {
        &self.executor
    }
}
