//! Application state management
//! This module constructs the session once and hands out its handle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::core::network::{NetworkJoiner, SystemNetworkJoiner};
use crate::core::transport::Transport;
use crate::core::{BluetoothManager, Session, SessionHandle};

/// Application state
pub struct AppState {
    /// Handle to the running session actor
    pub session: SessionHandle,
    actor: JoinHandle<()>,
}

impl AppState {
    /// Creates the bluest transport, the system network joiner and the
    /// session actor, and starts the actor on the current runtime.
    pub async fn new(config: SessionConfig) -> Result<Self> {
        info!("Initializing BluetoothManager...");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = BluetoothManager::new(events_tx).await?;
        let joiner = Arc::new(SystemNetworkJoiner::new(config.wifi_interface.clone()));
        Ok(Self::with_parts(config, transport, events_rx, joiner))
    }

    /// Wires an already constructed transport and joiner into a running session.
    pub fn with_parts<T: Transport>(
        config: SessionConfig,
        transport: T,
        transport_events: mpsc::UnboundedReceiver<crate::core::bluetooth::TransportEvent>,
        joiner: Arc<dyn NetworkJoiner>,
    ) -> Self {
        let (session, handle) = Session::new(config, transport, transport_events, joiner);
        let actor = tokio::spawn(session.run());
        Self {
            session: handle,
            actor,
        }
    }

    /// Stops the session and waits up to `limit` for it to release the radio.
    ///
    /// Every other clone of the session handle must already be dropped,
    /// otherwise the actor keeps running until `limit` expires.
    pub async fn shutdown(self, limit: Duration) -> Result<()> {
        info!("Shutting down session...");
        drop(self.session);
        match tokio::time::timeout(limit, self.actor).await {
            Ok(joined) => joined.map_err(|e| anyhow!("Session task failed: {}", e)),
            Err(_) => Err(anyhow!("Session did not stop within {:?}", limit)),
        }
    }

    /// Gets a clone of the session handle
    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }
}
