//! Observable session state published to the presentation layer.

use serde::Serialize;

use crate::core::bluetooth::DiscoveredDevice;
use crate::core::credentials::Credentials;

/// Sub-state of an established link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    /// Looking for the hotspot service and its characteristic
    Negotiating,
    /// Commands can be dispatched
    Ready,
    /// Link is up but the expected endpoints are missing
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Connected(LinkState),
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// A point-in-time copy of everything an observer may render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub scanning: bool,
    pub devices: Vec<DiscoveredDevice>,
    pub command_in_flight: bool,
    pub status: String,
    pub credentials: Option<Credentials>,
    pub joining: bool,
    pub join_status: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            scanning: false,
            devices: Vec::new(),
            command_in_flight: false,
            status: String::new(),
            credentials: None,
            joining: false,
            join_status: None,
        }
    }
}
