//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;
use uuid::Uuid;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Platform-specific unique identifier, also the handle the transport resolves
    pub id: String,
    /// The advertised name of the device
    pub name: String,
    /// The signal strength (RSSI) of the first advertisement seen
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// Creates a new DiscoveredDevice instance
    pub fn new(id: String, name: String, rssi: Option<i16>) -> Self {
        Self { id, name, rssi }
    }
}

/// The negotiated service/characteristic pair commands are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteTarget {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Radio availability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerState {
    Unknown,
    Unavailable,
    Ready,
}

/// Everything the transport reports back to the session.
///
/// Every operation on [`Transport`](crate::core::transport::Transport) is
/// fire-and-forget; its outcome arrives later as one of these events.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Advertisement {
        device_id: String,
        name: Option<String>,
        rssi: Option<i16>,
    },
    Connected {
        device_id: String,
    },
    ConnectFailed {
        device_id: String,
        reason: String,
    },
    Disconnected {
        device_id: String,
        reason: Option<String>,
    },
    ServicesDiscovered {
        device_id: String,
        result: Result<Vec<Uuid>, String>,
    },
    CharacteristicsDiscovered {
        device_id: String,
        service: Uuid,
        result: Result<Vec<Uuid>, String>,
    },
    /// Acknowledgement of the write issued with the same `tag`.
    WriteCompleted {
        tag: u64,
        result: Result<(), String>,
    },
    Notification {
        characteristic: Uuid,
        payload: Vec<u8>,
    },
}
