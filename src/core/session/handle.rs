//! Cloneable entry point into the session actor.

use tokio::sync::{mpsc, watch};

use crate::core::bluetooth::HotspotCommand;
use crate::core::session::SessionSnapshot;
use crate::error::SessionError;

/// Caller-initiated operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    StartScan,
    Connect { device_id: String },
    Dispatch(HotspotCommand),
    Disconnect,
}

/// Handle used by every component that needs to drive the session.
///
/// All calls return as soon as the request is queued; outcomes surface
/// through [`SessionHandle::subscribe`].
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<SessionRequest>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(crate) fn new(
        requests: mpsc::UnboundedSender<SessionRequest>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            requests,
            snapshots,
        }
    }

    pub fn start_scan(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::StartScan)
    }

    pub fn connect(&self, device_id: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionRequest::Connect {
            device_id: device_id.into(),
        })
    }

    pub fn dispatch(&self, command: HotspotCommand) -> Result<(), SessionError> {
        self.send(SessionRequest::Dispatch(command))
    }

    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::Disconnect)
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    fn send(&self, request: SessionRequest) -> Result<(), SessionError> {
        self.requests
            .send(request)
            .map_err(|_| SessionError::Closed)
    }
}
