//! In-memory list of the devices seen during the current scan.

use crate::core::bluetooth::DiscoveredDevice;

/// De-duplicated devices in first-seen order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DiscoveredDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every device. Called at the start of each scan.
    pub fn begin_scan(&mut self) {
        self.devices.clear();
    }

    /// Records an advertisement. Returns `true` if a new entry was added.
    ///
    /// Nameless advertisements and repeats of a known identity are dropped;
    /// a repeat never refreshes the stored signal strength.
    pub fn observe(&mut self, id: &str, name: &str, rssi: Option<i16>) -> bool {
        if name.is_empty() || self.contains(id) {
            return false;
        }
        self.devices
            .push(DiscoveredDevice::new(id.to_string(), name.to_string(), rssi));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
