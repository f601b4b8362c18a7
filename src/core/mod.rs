//! Core functionality for the hotspot remote
//! This module contains the session state machine and the collaborators it drives

pub mod bluetooth;
pub mod credentials;
pub mod network;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use session::{Session, SessionHandle, SessionSnapshot};
