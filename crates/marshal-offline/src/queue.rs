//! Durable offline action queue
//!
//! Single writer, single reader per device. Every mutation is written through
//! to a [`QueueStorage`] before it returns, so a restart resumes exactly
//! where the device left off. There is no discard operation: a
//! queued action is cancelled by queueing its inverse.

use crate::action::{ActionStatus, ActionType, OfflineAction, PermanentFailure};
use crate::error::QueueError;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ulid::Ulid;

/// Persisted queue document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    /// Queued actions, FIFO
    #[serde(default)]
    pub actions: Vec<OfflineAction>,
    /// Actions dropped after a 4xx
    #[serde(default)]
    pub permanent_failures: Vec<PermanentFailure>,
}

/// Where the queue document lives
pub trait QueueStorage: Send + Sync {
    /// Load the document, empty if nothing was saved yet
    ///
    /// # Errors
    /// I/O or deserialization failure
    fn load(&self) -> Result<QueueState, QueueError>;

    /// Replace the document
    ///
    /// # Errors
    /// I/O or serialization failure
    fn save(&self, state: &QueueState) -> Result<(), QueueError>;
}

/// Storage that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryQueueStorage {
    state: Mutex<QueueState>,
}

impl MemoryQueueStorage {
    /// Create empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStorage for MemoryQueueStorage {
    fn load(&self) -> Result<QueueState, QueueError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &QueueState) -> Result<(), QueueError> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

/// JSON file replaced atomically on every save
#[derive(Debug, Clone)]
pub struct JsonFileQueueStorage {
    path: PathBuf,
}

impl JsonFileQueueStorage {
    /// Create storage at `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStorage for JsonFileQueueStorage {
    fn load(&self) -> Result<QueueState, QueueError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(QueueState::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, state: &QueueState) -> Result<(), QueueError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, state)?;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        Ok(())
    }
}

/// How a transient failure left an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempts: u32,
    /// New status
    pub status: ActionStatus,
}

/// The device's action queue
pub struct OfflineQueue {
    storage: Arc<dyn QueueStorage>,
    state: Mutex<QueueState>,
}

impl OfflineQueue {
    /// Open a queue over storage, loading what was saved
    ///
    /// # Errors
    /// Storage load failure
    pub fn open(storage: Arc<dyn QueueStorage>) -> Result<Self, QueueError> {
        let state = storage.load()?;
        tracing::debug!(
            actions = state.actions.len(),
            permanent_failures = state.permanent_failures.len(),
            "opened offline queue"
        );
        Ok(Self {
            storage,
            state: Mutex::new(state),
        })
    }

    /// Queue held only in memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryQueueStorage::new()),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Append an action with a raw payload
    ///
    /// # Errors
    /// Storage save failure; the action is not queued then
    pub fn enqueue(&self, action_type: ActionType, payload: Value) -> Result<Ulid, QueueError> {
        self.enqueue_action(OfflineAction::new(action_type, payload))
    }

    /// Append a prepared action
    ///
    /// # Errors
    /// Storage save failure; the action is not queued then
    pub fn enqueue_action(&self, action: OfflineAction) -> Result<Ulid, QueueError> {
        let id = action.id;
        let action_type = action.action_type;
        self.mutate(|state| {
            state.actions.push(action);
            Ok(())
        })?;
        tracing::debug!(%id, %action_type, "queued offline action");
        Ok(id)
    }

    /// Actions still replayed by sync
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().actions.iter().filter(|a| a.is_replayable()).count()
    }

    /// Actions that exhausted their retries
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.state
            .lock()
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Failed)
            .count()
    }

    /// Copies of the failed actions
    #[must_use]
    pub fn failed_actions(&self) -> Vec<OfflineAction> {
        self.state
            .lock()
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Failed)
            .cloned()
            .collect()
    }

    /// Copies of the replayable actions, FIFO
    #[must_use]
    pub fn pending_actions(&self) -> Vec<OfflineAction> {
        self.state
            .lock()
            .actions
            .iter()
            .filter(|a| a.is_replayable())
            .cloned()
            .collect()
    }

    /// Copies of every queued action, FIFO
    #[must_use]
    pub fn actions(&self) -> Vec<OfflineAction> {
        self.state.lock().actions.clone()
    }

    /// Actions dropped after a 4xx
    #[must_use]
    pub fn permanent_failures(&self) -> Vec<PermanentFailure> {
        self.state.lock().permanent_failures.clone()
    }

    /// Whether nothing is left to replay
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.pending_count() == 0
    }

    /// Put failed actions back into the replay set, returning how many
    ///
    /// # Errors
    /// Storage save failure
    pub fn retry_failed(&self) -> Result<usize, QueueError> {
        let reset = self.mutate(|state| {
            let mut reset = 0;
            for action in state.actions.iter_mut().filter(|a| a.status == ActionStatus::Failed) {
                action.status = ActionStatus::Pending;
                action.attempts = 0;
                reset += 1;
            }
            Ok(reset)
        })?;
        tracing::info!(reset, "failed actions reset for retry");
        Ok(reset)
    }

    /// Drop a confirmed action
    ///
    /// # Errors
    /// [`QueueError::UnknownAction`] or storage save failure
    pub fn remove(&self, id: Ulid) -> Result<OfflineAction, QueueError> {
        self.mutate(|state| take(state, id))
    }

    /// Drop an action the server refused, recording why
    ///
    /// # Errors
    /// [`QueueError::UnknownAction`] or storage save failure
    pub fn record_permanent(&self, id: Ulid, status: u16, reason: String) -> Result<(), QueueError> {
        self.mutate(|state| {
            let mut action = take(state, id)?;
            action.attempts += 1;
            action.last_attempt = Some(Utc::now());
            state.permanent_failures.push(PermanentFailure {
                action,
                status,
                reason,
                failed_at: Utc::now(),
            });
            Ok(())
        })
    }

    /// Count a transient failure, marking the action failed at `max_attempts`
    ///
    /// # Errors
    /// [`QueueError::UnknownAction`] or storage save failure
    pub fn record_retry(&self, id: Ulid, max_attempts: u32, error: String) -> Result<RetryState, QueueError> {
        self.mutate(|state| {
            let action = state
                .actions
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(QueueError::UnknownAction(id))?;
            action.attempts += 1;
            action.last_attempt = Some(Utc::now());
            action.last_error = Some(error);
            action.status = if action.attempts >= max_attempts {
                ActionStatus::Failed
            } else {
                ActionStatus::Retrying
            };
            Ok(RetryState {
                attempts: action.attempts,
                status: action.status,
            })
        })
    }

    /// Apply a change and persist it; the in-memory state is only replaced on success
    fn mutate<T>(&self, f: impl FnOnce(&mut QueueState) -> Result<T, QueueError>) -> Result<T, QueueError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.storage.save(&next)?;
        *guard = next;
        Ok(out)
    }
}

fn take(state: &mut QueueState, id: Ulid) -> Result<OfflineAction, QueueError> {
    let position = state
        .actions
        .iter()
        .position(|a| a.id == id)
        .ok_or(QueueError::UnknownAction(id))?;
    Ok(state.actions.remove(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn retry_marks_failed_at_bound() {
        let queue = OfflineQueue::in_memory();
        let id = queue.enqueue(ActionType::CheckIn, json!({})).unwrap();

        for attempt in 1..5 {
            let state = queue.record_retry(id, 5, "503".into()).unwrap();
            assert_eq!(state.attempts, attempt);
            assert_eq!(state.status, ActionStatus::Retrying);
        }
        let state = queue.record_retry(id, 5, "503".into()).unwrap();
        assert_eq!(state.status, ActionStatus::Failed);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.failed_count(), 1);
    }

    #[test]
    fn retry_failed_resets_attempts() {
        let queue = OfflineQueue::in_memory();
        let id = queue.enqueue(ActionType::CheckIn, json!({})).unwrap();
        queue.record_retry(id, 1, "timeout".into()).unwrap();
        assert_eq!(queue.retry_failed().unwrap(), 1);

        let actions = queue.pending_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].attempts, 0);
        assert_eq!(actions[0].status, ActionStatus::Pending);
    }

    #[test]
    fn permanent_failure_is_recorded_and_removed() {
        let queue = OfflineQueue::in_memory();
        let id = queue.enqueue(ActionType::ChecklistComplete, json!({})).unwrap();
        queue.record_permanent(id, 404, "item gone".into()).unwrap();

        assert!(queue.is_drained());
        assert!(queue.actions().is_empty());
        let failures = queue.permanent_failures();
        assert_eq!(failures[0].status, 404);
        assert_eq!(failures[0].action.id, id);
    }

    #[test]
    fn unknown_action_is_an_error() {
        let queue = OfflineQueue::in_memory();
        assert!(matches!(queue.remove(Ulid::new()), Err(QueueError::UnknownAction(_))));
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonFileQueueStorage::new(dir.path().join("queue.json")));

        let queue = OfflineQueue::open(storage.clone()).unwrap();
        let first = queue.enqueue(ActionType::CheckIn, json!({"n": 1})).unwrap();
        let second = queue.enqueue(ActionType::CheckIn, json!({"n": 2})).unwrap();
        queue.record_retry(first, 5, "network".into()).unwrap();
        drop(queue);

        let reopened = OfflineQueue::open(storage).unwrap();
        let actions = reopened.actions();
        assert_eq!(actions.iter().map(|a| a.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(actions[0].attempts, 1);
        assert_eq!(actions[0].status, ActionStatus::Retrying);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileQueueStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.load().unwrap(), QueueState::default());
    }
}
