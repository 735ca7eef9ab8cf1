//! Jittered sync scheduler
//!
//! One background task per device session owns the only drain timer.
//! Triggers:
//! - connectivity flips to online
//! - the periodic health tick finds replayable actions while online
//! - [`SyncHandle::request_sync`], e.g. right after an enqueue
//!
//! A trigger arms the timer with a uniform delay in the jitter window unless
//! it is already armed. When the timer fires the queue is drained once; if
//! work remains and the device is still online, the timer is armed again.
//! [`SyncHandle::shutdown`] stops the task; dropping the handle aborts it.

use crate::sync::{DrainReport, SyncEngine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Builder for the background sync task
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    connectivity: watch::Receiver<bool>,
    rng: StdRng,
}

impl SyncScheduler {
    /// Create scheduler over a sync engine and a connectivity channel
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>, connectivity: watch::Receiver<bool>) -> Self {
        Self {
            engine,
            connectivity,
            rng: StdRng::from_os_rng(),
        }
    }

    /// With a fixed jitter seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Start the background task
    #[must_use]
    pub fn spawn(self) -> SyncHandle {
        let wake = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (reports_tx, reports_rx) = watch::channel(None);

        let task = tokio::spawn(self.run(Arc::clone(&wake), shutdown_rx, reports_tx));

        SyncHandle {
            wake,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            reports: reports_rx,
        }
    }

    fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    fn jitter(&mut self) -> Duration {
        let (min, max) = self.engine.config().jitter_bounds();
        Duration::from_millis(self.rng.random_range(min..=max))
    }

    fn arm(&mut self, deadline: &mut Option<Instant>, reason: &'static str) {
        if deadline.is_some() {
            return;
        }
        let delay = self.jitter();
        tracing::debug!(reason, delay_ms = delay.as_millis(), "drain scheduled");
        *deadline = Some(Instant::now() + delay);
    }

    async fn run(
        mut self,
        wake: Arc<Notify>,
        mut shutdown: oneshot::Receiver<()>,
        reports: watch::Sender<Option<DrainReport>>,
    ) {
        let interval = self.engine.config().health_check_interval();
        let mut tick = tokio::time::interval_at(Instant::now() + interval, interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut connectivity_open = true;
        let mut deadline: Option<Instant> = None;

        if self.is_online() && !self.engine.queue().is_drained() {
            self.arm(&mut deadline, "startup");
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = self.connectivity.changed(), if connectivity_open => {
                    if changed.is_err() {
                        connectivity_open = false;
                    } else if *self.connectivity.borrow_and_update() {
                        self.arm(&mut deadline, "reconnected");
                    }
                }
                _ = tick.tick() => {
                    if self.is_online() && !self.engine.queue().is_drained() {
                        self.arm(&mut deadline, "health tick");
                    }
                }
                () = wake.notified() => {
                    self.arm(&mut deadline, "requested");
                }
                () = wait_until(deadline) => {
                    deadline = None;
                    match self.engine.drain_once().await {
                        Ok(report) => {
                            let again = report.has_remaining() && !report.skipped_offline && self.is_online();
                            reports.send_replace(Some(report));
                            if again {
                                self.arm(&mut deadline, "work remaining");
                            }
                        }
                        Err(err) => tracing::error!(error = %err, "drain pass aborted"),
                    }
                }
            }
        }

        tracing::debug!("sync scheduler stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Handle to the running sync task
pub struct SyncHandle {
    wake: Arc<Notify>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    reports: watch::Receiver<Option<DrainReport>>,
}

impl SyncHandle {
    /// Ask for a drain after the usual jitter
    pub fn request_sync(&self) {
        self.wake.notify_one();
    }

    /// Report of the latest drain pass
    #[must_use]
    pub fn last_report(&self) -> Option<DrainReport> {
        self.reports.borrow().clone()
    }

    /// Channel of drain reports
    #[must_use]
    pub fn reports(&self) -> watch::Receiver<Option<DrainReport>> {
        self.reports.clone()
    }

    /// Stop the task and wait for it
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "sync task ended abnormally");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
