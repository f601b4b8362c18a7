//! Bluetooth manager for the hotspot remote
//! This module provides the bluest-backed implementation of [`Transport`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use bluest::{Adapter, AdapterEvent, Uuid};
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc};

use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{PowerState, TransportEvent, WriteTarget};
use crate::core::transport::Transport;

/// Manages Bluetooth operations
pub struct BluetoothManager {
    power: Arc<RwLock<PowerState>>,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    /// Notification handler
    notification_handler: NotificationHandler,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager reporting on `events`
    pub async fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

        let initial = match adapter.is_available().await {
            Ok(true) => PowerState::Ready,
            Ok(false) => PowerState::Unavailable,
            Err(e) => {
                warn!("Could not query Bluetooth availability: {}", e);
                PowerState::Unknown
            }
        };
        info!("Bluetooth adapter found, power state {:?}.", initial);
        let power = Arc::new(RwLock::new(initial));
        tokio::spawn(Self::watch_power(adapter.clone(), power.clone()));

        let devices = Arc::new(Mutex::new(HashMap::new()));
        let connection_manager =
            ConnectionManager::new(adapter.clone(), devices.clone(), events.clone());
        let scanner = BluetoothScanner::new(adapter, devices, events.clone());
        let notification_handler =
            NotificationHandler::new(connection_manager.characteristic_cache(), events);

        Ok(Self {
            power,
            connection_manager,
            scanner,
            notification_handler,
        })
    }

    async fn watch_power(adapter: Adapter, power: Arc<RwLock<PowerState>>) {
        let mut adapter_events = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to watch adapter state: {}", e);
                return;
            }
        };
        while let Some(event) = adapter_events.next().await {
            let state = match event {
                Ok(AdapterEvent::Available) => PowerState::Ready,
                Ok(AdapterEvent::Unavailable) => PowerState::Unavailable,
                Err(e) => {
                    warn!("Adapter event error: {}", e);
                    continue;
                }
            };
            info!("Bluetooth power state changed to {:?}", state);
            if let Ok(mut current) = power.write() {
                *current = state;
            }
        }
    }
}

impl Transport for BluetoothManager {
    fn power_state(&self) -> PowerState {
        self.power
            .read()
            .map(|state| *state)
            .unwrap_or(PowerState::Unknown)
    }

    fn start_scan(&mut self, service_filter: Option<Uuid>) {
        self.scanner.start_scan(service_filter);
    }

    fn stop_scan(&mut self) {
        self.scanner.stop_scan();
    }

    fn connect(&mut self, device_id: &str) {
        self.connection_manager.connect(device_id);
    }

    fn disconnect(&mut self, device_id: &str) {
        if self.connection_manager.is_current(device_id) {
            self.notification_handler.stop_notifications();
        }
        self.connection_manager.disconnect(device_id);
    }

    fn discover_services(&mut self, device_id: &str, service: Uuid) {
        self.connection_manager.discover_services(device_id, service);
    }

    fn discover_characteristics(&mut self, device_id: &str, service: Uuid, characteristic: Uuid) {
        self.connection_manager
            .discover_characteristics(device_id, service, characteristic);
    }

    fn write(&mut self, target: &WriteTarget, payload: Vec<u8>, tag: u64) {
        self.connection_manager.write(target, payload, tag);
    }

    fn set_notify(&mut self, target: &WriteTarget, enabled: bool) {
        if enabled {
            self.notification_handler.setup_notifications(*target);
        } else {
            self.notification_handler.stop_notifications();
        }
    }

    fn settle(&self) -> impl Future<Output = ()> + Send {
        self.connection_manager.settle()
    }
}
