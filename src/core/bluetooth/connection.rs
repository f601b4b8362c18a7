//! Bluetooth connection handling for the companion device
//! This module connects and disconnects, negotiates the hotspot service and
//! characteristic, and performs acknowledged writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use bluest::{Adapter, Characteristic, ConnectionEvent, Device, Service, Uuid};
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::bluetooth::constants::{CONNECT_RETRY_DELAY_MS, MAX_CONNECT_RETRIES};
use crate::core::bluetooth::types::{TransportEvent, WriteTarget};

pub(crate) type DeviceMap = Arc<Mutex<HashMap<String, Device>>>;
pub(crate) type CharacteristicCache = Arc<Mutex<HashMap<(Uuid, Uuid), Characteristic>>>;

/// Connection manager for the companion device
pub struct ConnectionManager {
    adapter: Adapter,
    devices: DeviceMap,
    events: mpsc::UnboundedSender<TransportEvent>,
    services: Arc<Mutex<HashMap<Uuid, Service>>>,
    characteristics: CharacteristicCache,
    /// Device this manager currently owns a link (or a pending connect) for.
    /// The token cancels its link watcher and pending connect retries.
    link: Option<(String, CancellationToken)>,
    /// Connect and disconnect tasks, awaited by [`ConnectionManager::settle`]
    tasks: TaskTracker,
}

impl ConnectionManager {
    pub fn new(
        adapter: Adapter,
        devices: DeviceMap,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            adapter,
            devices,
            events,
            services: Arc::new(Mutex::new(HashMap::new())),
            characteristics: Arc::new(Mutex::new(HashMap::new())),
            link: None,
            tasks: TaskTracker::new(),
        }
    }

    /// Whether `device_id` is the device the current link belongs to.
    pub fn is_current(&self, device_id: &str) -> bool {
        self.link.as_ref().is_some_and(|(id, _)| id == device_id)
    }

    /// Waits for every outstanding connect and disconnect task to finish.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    pub(crate) fn characteristic_cache(&self) -> CharacteristicCache {
        self.characteristics.clone()
    }

    /// Connects with a short retry loop and reports the final outcome.
    pub fn connect(&mut self, device_id: &str) {
        if let Some((_, previous)) = self.link.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.link = Some((device_id.to_string(), token.clone()));

        let adapter = self.adapter.clone();
        let devices = self.devices.clone();
        let events = self.events.clone();
        let device_id = device_id.to_string();

        self.tasks.spawn(async move {
            let Some(device) = devices.lock().await.get(&device_id).cloned() else {
                let _ = events.send(TransportEvent::ConnectFailed {
                    device_id: device_id.clone(),
                    reason: format!("Device not found with ID: {}", device_id),
                });
                return;
            };

            match Self::connect_with_retry(&adapter, &device, &token).await {
                Ok(()) if token.is_cancelled() => {
                    // Disconnect was requested while the connect was in progress.
                    info!("Connect to {} completed after cancellation, dropping link", device_id);
                    if let Err(e) = adapter.disconnect_device(&device).await {
                        error!("Failed to disconnect from {}: {}", device_id, e);
                    }
                }
                Ok(()) => {
                    info!("Successfully connected to device {}", device_id);
                    let _ = events.send(TransportEvent::Connected {
                        device_id: device_id.clone(),
                    });
                    Self::watch_link(adapter, device, device_id, events, token).await;
                }
                Err(e) => {
                    let _ = events.send(TransportEvent::ConnectFailed {
                        device_id,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    async fn connect_with_retry(
        adapter: &Adapter,
        device: &Device,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=MAX_CONNECT_RETRIES {
            if token.is_cancelled() {
                return Err(anyhow!("Connection attempt cancelled"));
            }
            if device.is_connected().await {
                return Ok(());
            }
            info!("Initiating connection to {} (attempt {})...", device.id(), attempt);
            match adapter.connect_device(device).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(anyhow!(e));
                    if attempt < MAX_CONNECT_RETRIES {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = tokio::time::sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)) => {}
                        }
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to connect after {} attempts", MAX_CONNECT_RETRIES)))
    }

    /// Reports a peer-initiated disconnect until the link token is cancelled.
    async fn watch_link(
        adapter: Adapter,
        device: Device,
        device_id: String,
        events: mpsc::UnboundedSender<TransportEvent>,
        token: CancellationToken,
    ) {
        let mut link_events = match adapter.device_connection_events(&device).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to watch connection state of {}: {}", device_id, e);
                return;
            }
        };

        loop {
            tokio::select! {
                event = link_events.next() => match event {
                    Some(ConnectionEvent::Disconnected) => {
                        info!("Device {} disconnected", device_id);
                        let _ = events.send(TransportEvent::Disconnected {
                            device_id,
                            reason: None,
                        });
                        break;
                    }
                    Some(ConnectionEvent::Connected) => {}
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }
    }

    pub fn discover_services(&mut self, device_id: &str, service_uuid: Uuid) {
        let devices = self.devices.clone();
        let services = self.services.clone();
        let events = self.events.clone();
        let device_id = device_id.to_string();

        tokio::spawn(async move {
            let result = async {
                let device = devices
                    .lock()
                    .await
                    .get(&device_id)
                    .cloned()
                    .ok_or_else(|| anyhow!("Device not found with ID: {}", device_id))?;
                info!("Discovering services on {}...", device_id);
                let found = device.discover_services_with_uuid(service_uuid).await?;
                let mut cache = services.lock().await;
                let mut uuids = Vec::with_capacity(found.len());
                for service in found {
                    info!("Available service: {}", service.uuid());
                    uuids.push(service.uuid());
                    cache.insert(service.uuid(), service);
                }
                Ok::<_, anyhow::Error>(uuids)
            }
            .await;

            let _ = events.send(TransportEvent::ServicesDiscovered {
                device_id,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    pub fn discover_characteristics(
        &mut self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) {
        let services = self.services.clone();
        let characteristics = self.characteristics.clone();
        let events = self.events.clone();
        let device_id = device_id.to_string();

        tokio::spawn(async move {
            let result = async {
                let service = services
                    .lock()
                    .await
                    .get(&service_uuid)
                    .cloned()
                    .ok_or_else(|| anyhow!("Service not discovered: {}", service_uuid))?;
                let found = service
                    .discover_characteristics_with_uuid(characteristic_uuid)
                    .await?;
                let mut cache = characteristics.lock().await;
                let mut uuids = Vec::with_capacity(found.len());
                for characteristic in found {
                    info!("Found characteristic: {}", characteristic.uuid());
                    uuids.push(characteristic.uuid());
                    cache.insert((service_uuid, characteristic.uuid()), characteristic);
                }
                Ok::<_, anyhow::Error>(uuids)
            }
            .await;

            let _ = events.send(TransportEvent::CharacteristicsDiscovered {
                device_id,
                service: service_uuid,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    /// Writes with response and reports the acknowledgement under `tag`.
    pub fn write(&mut self, target: &WriteTarget, payload: Vec<u8>, tag: u64) {
        let characteristics = self.characteristics.clone();
        let events = self.events.clone();
        let key = (target.service, target.characteristic);

        tokio::spawn(async move {
            let characteristic = characteristics.lock().await.get(&key).cloned();
            let result = match characteristic {
                Some(characteristic) => {
                    info!("Writing {:02x?} to {}", payload, characteristic.uuid());
                    characteristic
                        .write(&payload)
                        .await
                        .map_err(|e| e.to_string())
                }
                None => Err(format!("Characteristic not available: {}", key.1)),
            };
            let _ = events.send(TransportEvent::WriteCompleted { tag, result });
        });
    }

    /// Disconnect from the device and drop every cached handle.
    ///
    /// A device other than the current one only has its link dropped; the
    /// current link's watcher and caches are left alone.
    pub fn disconnect(&mut self, device_id: &str) {
        let current = self.is_current(device_id);
        if current {
            if let Some((_, token)) = self.link.take() {
                token.cancel();
            }
        }

        let adapter = self.adapter.clone();
        let devices = self.devices.clone();
        let services = self.services.clone();
        let characteristics = self.characteristics.clone();
        let device_id = device_id.to_string();

        self.tasks.spawn(async move {
            if current {
                services.lock().await.clear();
                characteristics.lock().await.clear();
            }

            let Some(device) = devices.lock().await.get(&device_id).cloned() else {
                warn!("Device {} not known, nothing to disconnect", device_id);
                return;
            };
            if device.is_connected().await {
                info!("Disconnecting from device {}", device_id);
                match adapter.disconnect_device(&device).await {
                    Ok(()) => info!("Successfully disconnected"),
                    Err(e) => error!("Failed to disconnect from {}: {}", device_id, e),
                }
            } else {
                info!("Device {} not connected", device_id);
            }
        });
    }
}
