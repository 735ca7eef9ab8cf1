//! Sync engine
//!
//! [`SyncEngine::drain_once`] makes one FIFO pass over the replayable actions:
//! - success: the action is removed
//! - 4xx: the action is removed and recorded as a permanent failure
//! - 5xx, network error or timeout: attempts++, `failed` at the bound, and the
//!   pass stops so later actions never overtake an earlier one
//!
//! The pass is skipped entirely while the health probe reports offline.

use crate::action::ActionStatus;
use crate::config::SyncConfig;
use crate::error::{QueueError, TransportError};
use crate::queue::OfflineQueue;
use crate::transport::{ActionTransport, HealthProbe};
use serde::Serialize;
use std::sync::Arc;

/// Summary of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Probe reported offline, nothing was sent
    pub skipped_offline: bool,
    /// Sends made
    pub attempted: usize,
    /// Confirmed and removed
    pub succeeded: usize,
    /// Transient failures left for another pass
    pub retried: usize,
    /// Transient failures that hit the attempt bound
    pub failed: usize,
    /// 4xx drops
    pub permanent: usize,
    /// Replayable actions left after the pass
    pub remaining: usize,
}

impl DrainReport {
    /// Whether another pass is worth scheduling
    #[inline]
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }
}

/// Replays the queue through a transport
pub struct SyncEngine {
    queue: Arc<OfflineQueue>,
    transport: Arc<dyn ActionTransport>,
    probe: Arc<dyn HealthProbe>,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create new sync engine
    pub fn new(
        queue: Arc<OfflineQueue>,
        transport: Arc<dyn ActionTransport>,
        probe: Arc<dyn HealthProbe>,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            probe,
            config,
        }
    }

    /// Queue being drained
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    /// Active config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the server is reachable now
    pub async fn is_online(&self) -> bool {
        self.probe.is_online().await
    }

    /// One drain pass
    ///
    /// # Errors
    /// Queue persistence failure; the pass stops at the failing action
    pub async fn drain_once(&self) -> Result<DrainReport, QueueError> {
        let mut report = DrainReport::default();

        if !self.probe.is_online().await {
            report.skipped_offline = true;
            report.remaining = self.queue.pending_count();
            tracing::debug!(remaining = report.remaining, "offline, drain skipped");
            return Ok(report);
        }

        for action in self.queue.pending_actions() {
            report.attempted += 1;
            let sent = tokio::time::timeout(self.config.request_timeout(), self.transport.send(&action))
                .await
                .unwrap_or(Err(TransportError::Timeout));

            match sent {
                Ok(()) => {
                    self.queue.remove(action.id)?;
                    report.succeeded += 1;
                }
                Err(err) if err.is_permanent() => {
                    let status = err.status().unwrap_or_default();
                    tracing::warn!(id = %action.id, action_type = %action.action_type, status, "action refused, dropped");
                    self.queue.record_permanent(action.id, status, err.to_string())?;
                    report.permanent += 1;
                }
                Err(err) => {
                    let state = self
                        .queue
                        .record_retry(action.id, self.config.max_attempts, err.to_string())?;
                    if state.status == ActionStatus::Failed {
                        tracing::warn!(id = %action.id, attempts = state.attempts, error = %err, "action failed, giving up");
                        report.failed += 1;
                    } else {
                        tracing::warn!(id = %action.id, attempts = state.attempts, error = %err, "action will be retried");
                        report.retried += 1;
                    }
                    break;
                }
            }
        }

        report.remaining = self.queue.pending_count();
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            retried = report.retried,
            failed = report.failed,
            permanent = report.permanent,
            remaining = report.remaining,
            "drain pass finished"
        );
        Ok(report)
    }
}
