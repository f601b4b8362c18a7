//! Bluetooth functionality for the hotspot remote
//! This module handles all bluetooth operations including scanning,
//! connecting, writing commands and receiving notifications from the
//! companion device.

mod commands;
mod connection;
mod constants;
mod manager;
mod notification;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use commands::HotspotCommand;
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use manager::BluetoothManager;
pub use notification::NotificationHandler;
pub use scanner::BluetoothScanner;
pub use types::{DiscoveredDevice, PowerState, TransportEvent, WriteTarget};
