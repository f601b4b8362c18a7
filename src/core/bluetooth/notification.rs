//! Notification handling for the companion device
//! This module subscribes to the control characteristic and forwards every
//! payload to the session unparsed.

use anyhow::{Result, anyhow};
use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::connection::CharacteristicCache;
use crate::core::bluetooth::types::{TransportEvent, WriteTarget};

/// Notification handler for the control characteristic
pub struct NotificationHandler {
    characteristics: CharacteristicCache,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel_token: CancellationToken,
}

impl NotificationHandler {
    pub fn new(
        characteristics: CharacteristicCache,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            characteristics,
            events,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribes to `target`, replacing any previous subscription.
    pub fn setup_notifications(&mut self, target: WriteTarget) {
        info!("Subscribing to notifications...");
        self.stop_notifications();
        self.cancel_token = CancellationToken::new();

        let characteristics = self.characteristics.clone();
        let events = self.events.clone();
        let token = self.cancel_token.clone();

        tokio::spawn(async move {
            let characteristic = characteristics
                .lock()
                .await
                .get(&(target.service, target.characteristic))
                .cloned();
            match characteristic {
                Some(characteristic) => {
                    if let Err(e) = Self::process_notifications(characteristic, events, token).await
                    {
                        error!("Failed to subscribe to notifications: {}", e);
                    }
                }
                None => error!(
                    "Cannot subscribe, characteristic {} was not discovered",
                    target.characteristic
                ),
            }
        });
    }

    pub fn stop_notifications(&mut self) {
        self.cancel_token.cancel();
    }

    async fn process_notifications(
        characteristic: Characteristic,
        events: mpsc::UnboundedSender<TransportEvent>,
        token: CancellationToken,
    ) -> Result<()> {
        let uuid = characteristic.uuid();
        let mut notification_stream = characteristic
            .notify()
            .await
            .map_err(|e| anyhow!(e))?;
        info!("Listening for notifications on {}...", uuid);

        loop {
            tokio::select! {
                result = notification_stream.next() => match result {
                    Some(Ok(value)) => {
                        debug!("Received notification: {:?}", value);
                        if events
                            .send(TransportEvent::Notification { characteristic: uuid, payload: value })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Error in notification stream: {}", e);
                        break;
                    }
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }

        info!("Notification stream ended");
        Ok(())
    }
}
