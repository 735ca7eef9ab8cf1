//! In-process transport replaying actions against a [`ChecklistEngine`]
//!
//! Engine errors are mapped to the status a server would answer with, so the
//! sync engine classifies them exactly as it would over the network.

use crate::action::{ActionPayload, ActionType, OfflineAction};
use crate::error::TransportError;
use crate::transport::ActionTransport;
use marshal_checklist::{ChecklistEngine, ChecklistError, CompletionRequest};
use std::sync::Arc;

/// Transport delivering actions straight to an engine
pub struct EngineTransport {
    engine: Arc<ChecklistEngine>,
}

impl EngineTransport {
    /// Create transport over an engine
    #[inline]
    #[must_use]
    pub fn new(engine: Arc<ChecklistEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl ActionTransport for EngineTransport {
    async fn send(&self, action: &OfflineAction) -> Result<(), TransportError> {
        let payload = action.decode().map_err(|err| {
            tracing::warn!(id = %action.id, error = %err, "malformed action payload");
            TransportError::Status(400)
        })?;

        match payload {
            ActionPayload::Checklist(payload) => {
                let request = CompletionRequest::from(payload);
                let result = if action.action_type == ActionType::ChecklistComplete {
                    self.engine.complete_task(&request).await
                } else {
                    self.engine.uncomplete_task(&request).await
                };
                result.map(|_| ()).map_err(to_status)
            }
            ActionPayload::CheckIn(payload) => self
                .engine
                .check_in(
                    &payload.event_id,
                    &payload.marshal_id,
                    &payload.checkpoint_id,
                    payload.checked_in,
                    payload.actor.as_ref(),
                )
                .await
                .map(|_| ())
                .map_err(to_status),
        }
    }
}

fn to_status(err: ChecklistError) -> TransportError {
    let status = err.status_code();
    tracing::debug!(status, error = %err, "engine refused action");
    TransportError::Status(status)
}
