//! Network seams used by the sync engine

use crate::action::OfflineAction;
use crate::error::TransportError;
use tokio::sync::watch;

/// Sends one queued action to the server
#[async_trait::async_trait]
pub trait ActionTransport: Send + Sync {
    /// Replay the action; `Ok` means the server converged to its target state
    async fn send(&self, action: &OfflineAction) -> Result<(), TransportError>;
}

/// Reports whether the server is reachable
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    /// Result of a health check
    async fn is_online(&self) -> bool;
}

/// Probe that never reports offline
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait::async_trait]
impl HealthProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Probe following a connectivity flag
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    rx: watch::Receiver<bool>,
}

impl ConnectivityProbe {
    /// Create probe over a connectivity channel
    #[inline]
    #[must_use]
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }
}

#[async_trait::async_trait]
impl HealthProbe for ConnectivityProbe {
    async fn is_online(&self) -> bool {
        *self.rx.borrow()
    }
}
