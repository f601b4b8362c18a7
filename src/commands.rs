//! Presentation-facing commands
//! This module defines the operations a front end invokes. Each returns as
//! soon as the request is queued; progress is observed via [`session_snapshot`].

use crate::core::SessionSnapshot;
use crate::core::bluetooth::{DiscoveredDevice, HotspotCommand};
use crate::state::AppState;

/// Starts a new scan, clearing the discovered-device list.
pub fn start_scan(app_state: &AppState) -> Result<(), String> {
    app_state.session.start_scan().map_err(|e| e.to_string())
}

/// Connects to a device from the latest scan
///
/// # Arguments
/// * `device_id` - The unique identifier reported in the device list
/// * `app_state` - The application state
pub fn connect_to_device(device_id: String, app_state: &AppState) -> Result<(), String> {
    app_state
        .session
        .connect(device_id)
        .map_err(|e| e.to_string())
}

pub fn enable_hotspot(app_state: &AppState) -> Result<(), String> {
    app_state
        .session
        .dispatch(HotspotCommand::Enable)
        .map_err(|e| e.to_string())
}

pub fn disable_hotspot(app_state: &AppState) -> Result<(), String> {
    app_state
        .session
        .dispatch(HotspotCommand::Disable)
        .map_err(|e| e.to_string())
}

/// Disconnects from the current device, or stops a running scan
pub fn disconnect(app_state: &AppState) -> Result<(), String> {
    app_state.session.disconnect().map_err(|e| e.to_string())
}

pub fn session_snapshot(app_state: &AppState) -> SessionSnapshot {
    app_state.session.snapshot()
}

/// Devices found by the latest scan, in discovery order
pub fn list_devices(app_state: &AppState) -> Vec<DiscoveredDevice> {
    app_state.session.snapshot().devices
}
