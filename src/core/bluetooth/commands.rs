//! Hotspot commands implementation
//! This module contains all the commands that can be sent to the companion device

use serde::Serialize;

/// Device-directed commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HotspotCommand {
    /// Turn the hotspot on (0x01)
    Enable,
    /// Turn the hotspot off (0x00)
    Disable,
}

impl HotspotCommand {
    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Enable => vec![0x01],
            Self::Disable => vec![0x00],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enable => "enable hotspot",
            Self::Disable => "disable hotspot",
        }
    }
}
