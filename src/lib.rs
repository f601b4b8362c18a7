//! Hotspot Remote library
//! Discovers a companion device over Bluetooth LE, toggles its hotspot and
//! joins the network it shares back.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use error::SessionError;
