//! Timer loop driving the sync engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use curator_core::{Error, Result};

use crate::engine::{SyncEngine, SyncEvent};

/// Shortest polling interval; tokio timers reject a zero period.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    trigger_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SyncEvent>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling new ticks. A cycle already running finishes first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Request a tick now. The tick still passes through every gate.
    pub async fn trigger(&self) -> Result<()> {
        self.trigger_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Scheduler is not running".into()))?;
        Ok(())
    }

    /// Get a receiver for scheduler and engine events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the scheduler loop to exit.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Scheduler task failed: {}", e)))
    }
}

/// Repeating timer that calls [`SyncEngine::try_sync`].
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

impl SyncScheduler {
    /// Scheduler using the engine's configured polling interval.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let interval = engine.config().poll_interval().max(MIN_INTERVAL);
        Self { engine, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let event_rx = self.engine.events();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx, &mut trigger_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            trigger_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip_all, fields(subsystem = "sync", component = "scheduler"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>, trigger_rx: &mut mpsc::Receiver<()>) {
        if !self.engine.config().enabled {
            info!("Sync scheduler is disabled, not starting");
            return;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            language = %self.engine.config().language,
            "Sync scheduler started"
        );
        let events = self.engine.event_sender();
        let _ = events.send(SyncEvent::SchedulerStarted);

        // First tick fires one interval after start.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Sync scheduler received shutdown signal");
                    break;
                }
                Some(()) = trigger_rx.recv() => {
                    debug!("Manual sync trigger");
                    self.tick().await;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        let _ = events.send(SyncEvent::SchedulerStopped);
        info!("Sync scheduler stopped");
    }

    async fn tick(&self) {
        // Outcomes are logged and broadcast by the engine.
        self.engine.try_sync().await;
    }
}
