//! Constants used throughout the application
//! This module contains the protocol identifiers shared with the companion
//! device firmware and the default timings of the session.

use uuid::Uuid;

/// The UUID of the hotspot control service advertised by the companion device
pub const UUID_HOTSPOT_SERVICE: Uuid = Uuid::from_u128(0x8f3c0001_5b2e_4c1a_9d0e_6a1f2b3c4d5e);

/// The UUID of the control characteristic (write-with-response and notify)
pub const UUID_HOTSPOT_CONTROL_CHAR: Uuid = Uuid::from_u128(0x8f3c0002_5b2e_4c1a_9d0e_6a1f2b3c4d5e);

/// Scan ceiling in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;

/// Delay before the unfiltered fallback scan starts, in seconds
pub const DEFAULT_BROADCAST_GRACE_SECS: u64 = 3;

/// Minimum interval between two commands in milliseconds
pub const DEFAULT_COMMAND_INTERVAL_MS: u64 = 500;

/// Safety-net timeout for a command acknowledgement in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 5;

/// Maximum number of connection attempts before reporting a failure
pub const MAX_CONNECT_RETRIES: usize = 3;

/// Delay between connection retries in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;
