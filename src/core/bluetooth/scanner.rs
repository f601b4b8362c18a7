//! Bluetooth device discovery
//! Runs one or more cancellable scan passes and forwards every advertisement
//! to the session.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use bluest::{Adapter, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::types::TransportEvent;

/// Groups the passes that run between two `stop_scan` calls.
#[derive(Debug)]
struct ScanCycle {
    cancel_token: CancellationToken,
    running: bool,
}

impl ScanCycle {
    fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            running: false,
        }
    }

    /// Returns the token for a new pass and whether the pass opens a new cycle.
    fn begin_pass(&mut self) -> (CancellationToken, bool) {
        let fresh = !self.running;
        if fresh {
            self.cancel_token = CancellationToken::new();
            self.running = true;
        }
        (self.cancel_token.clone(), fresh)
    }

    fn stop(&mut self) {
        self.cancel_token.cancel();
        self.running = false;
    }
}

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    cycle: ScanCycle,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            adapter,
            devices,
            events,
            cycle: ScanCycle::new(),
        }
    }

    /// Starts a scan pass. Passes started before the next `stop_scan` share
    /// one cancellation token; the first pass of a cycle forgets the devices
    /// resolved by earlier cycles.
    pub fn start_scan(&mut self, service_filter: Option<Uuid>) {
        let (cancel_token_for_task, fresh) = self.cycle.begin_pass();

        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let events_for_task = self.events.clone();

        tokio::spawn(async move {
            if fresh {
                devices_for_task.lock().await.clear();
            }
            if let Err(e) = Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                events_for_task,
                cancel_token_for_task,
                service_filter,
            )
            .await
            {
                error!("Scan task finished with an error: {:?}", e);
            }
        });
        info!("Device scan task started (filter: {:?}).", service_filter);
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: mpsc::UnboundedSender<TransportEvent>,
        cancel_token: CancellationToken,
        service_filter: Option<Uuid>,
    ) -> Result<()> {
        let services: Vec<Uuid> = service_filter.into_iter().collect();
        let mut scan_stream = adapter.scan(&services).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            let rssi = discovered_device.rssi;
                            let id = device.id().to_string();
                            let name = discovered_device
                                .adv_data
                                .local_name
                                .clone()
                                .or_else(|| device.name().ok());

                            debug!("Found device - ID: {}, Name: {:?}, RSSI: {:?}", id, name, rssi);
                            devices.lock().await.insert(id.clone(), device);

                            if events
                                .send(TransportEvent::Advertisement { device_id: id, name, rssi })
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn stop_scan(&mut self) {
        info!("Stopping Bluetooth scan.");
        self.cycle.stop();
    }
}
