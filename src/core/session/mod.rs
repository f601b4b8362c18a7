//! Session state machine for the companion device
//! This module owns the single active session: discovery, the connection
//! lifecycle, endpoint negotiation, throttled command dispatch and
//! notification handling. All state lives in one actor task; the transport,
//! timers and the network joiner only talk to it through channels.

mod handle;
mod snapshot;

pub use handle::{SessionHandle, SessionRequest};
pub use snapshot::{ConnectionState, LinkState, SessionSnapshot};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::core::bluetooth::{
    HotspotCommand, PowerState, TransportEvent, UUID_HOTSPOT_CONTROL_CHAR, UUID_HOTSPOT_SERVICE,
    WriteTarget,
};
use crate::core::credentials::Credentials;
use crate::core::network::{JoinOutcome, NetworkJoiner};
use crate::core::registry::DeviceRegistry;
use crate::core::transport::Transport;

/// Scheduled follow-ups. Each carries the guard it was armed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timer {
    BroadcastFallback { scan: u64 },
    ScanCeiling { scan: u64 },
    CommandTimeout { tag: u64 },
}

/// Everything the actor reacts to
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Request(SessionRequest),
    Transport(TransportEvent),
    Timer(Timer),
    JoinFinished { ssid: String, outcome: JoinOutcome },
}

struct SessionInbox {
    requests: mpsc::UnboundedReceiver<SessionRequest>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    internal: mpsc::UnboundedReceiver<SessionEvent>,
}

/// The session actor
pub struct Session<T: Transport> {
    config: SessionConfig,
    transport: T,
    joiner: Arc<dyn NetworkJoiner>,
    registry: DeviceRegistry,

    state: ConnectionState,
    device_id: Option<String>,
    write_target: Option<WriteTarget>,

    last_command_at: Option<Instant>,
    /// Tag of the outstanding write, if any
    in_flight: Option<u64>,
    next_tag: u64,
    command_timer: CancellationToken,

    scan_generation: u64,
    scan_timers: CancellationToken,

    status: String,
    credentials: Option<Credentials>,
    joining: bool,
    join_status: Option<String>,

    internal_tx: mpsc::UnboundedSender<SessionEvent>,
    inbox: Option<SessionInbox>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<T: Transport> Session<T> {
    /// Creates the session and the handle used to drive it.
    ///
    /// `transport_events` must be the receiving end of the channel `transport`
    /// reports on.
    pub fn new(
        config: SessionConfig,
        transport: T,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        joiner: Arc<dyn NetworkJoiner>,
    ) -> (Self, SessionHandle) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let session = Self {
            config,
            transport,
            joiner,
            registry: DeviceRegistry::new(),
            state: ConnectionState::Idle,
            device_id: None,
            write_target: None,
            last_command_at: None,
            in_flight: None,
            next_tag: 0,
            command_timer: CancellationToken::new(),
            scan_generation: 0,
            scan_timers: CancellationToken::new(),
            status: String::new(),
            credentials: None,
            joining: false,
            join_status: None,
            internal_tx,
            inbox: Some(SessionInbox {
                requests: request_rx,
                transport_events,
                internal: internal_rx,
            }),
            snapshot_tx,
        };
        (session, SessionHandle::new(request_tx, snapshot_rx))
    }

    /// Runs until every [`SessionHandle`] is dropped or the transport goes away.
    pub async fn run(mut self) {
        let Some(mut inbox) = self.inbox.take() else {
            warn!("Session is already running");
            return;
        };
        info!("Session actor started");

        loop {
            let event = tokio::select! {
                request = inbox.requests.recv() => match request {
                    Some(request) => SessionEvent::Request(request),
                    None => break,
                },
                event = inbox.transport_events.recv() => match event {
                    Some(event) => SessionEvent::Transport(event),
                    None => break,
                },
                Some(event) = inbox.internal.recv() => event,
            };
            self.handle(event);
        }

        self.shutdown();
        self.transport.settle().await;
        info!("Session actor stopped");
    }

    pub(crate) fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Request(request) => self.handle_request(request),
            SessionEvent::Transport(event) => self.handle_transport_event(event),
            SessionEvent::Timer(timer) => self.handle_timer(timer),
            SessionEvent::JoinFinished { ssid, outcome } => self.finish_join(&ssid, outcome),
        }
        self.publish();
    }

    fn handle_request(&mut self, request: SessionRequest) {
        debug!("Session request: {:?}", request);
        match request {
            SessionRequest::StartScan => self.start_scan(),
            SessionRequest::Connect { device_id } => self.connect(&device_id),
            SessionRequest::Dispatch(command) => self.dispatch(command),
            SessionRequest::Disconnect => self.disconnect(),
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Advertisement {
                device_id,
                name,
                rssi,
            } => self.on_advertisement(&device_id, name.as_deref().unwrap_or(""), rssi),
            TransportEvent::Connected { device_id } => self.on_connected(&device_id),
            TransportEvent::ConnectFailed { device_id, reason } => {
                self.on_connect_failed(&device_id, &reason)
            }
            TransportEvent::Disconnected { device_id, reason } => {
                self.on_disconnected(&device_id, reason)
            }
            TransportEvent::ServicesDiscovered { device_id, result } => {
                self.on_services(&device_id, result)
            }
            TransportEvent::CharacteristicsDiscovered {
                device_id,
                service,
                result,
            } => self.on_characteristics(&device_id, service, result),
            TransportEvent::WriteCompleted { tag, result } => self.on_write_completed(tag, result),
            TransportEvent::Notification {
                characteristic,
                payload,
            } => self.on_notification(characteristic, &payload),
        }
    }

    // ── Scanning ────────────────────────────────────────────────

    fn start_scan(&mut self) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected(_) => {
                self.set_status("Disconnect before starting a new scan");
                return;
            }
            ConnectionState::Scanning => {
                info!("Restarting scan");
                self.stop_scanning();
            }
            ConnectionState::Idle | ConnectionState::Disconnected => {}
        }
        if !self.radio_ready() {
            return;
        }

        self.registry.begin_scan();
        self.scan_generation += 1;
        self.scan_timers = CancellationToken::new();
        self.state = ConnectionState::Scanning;

        self.transport.start_scan(Some(UUID_HOTSPOT_SERVICE));
        let scan = self.scan_generation;
        self.schedule(
            Duration::from_secs(self.config.broadcast_grace_secs),
            Timer::BroadcastFallback { scan },
            self.scan_timers.clone(),
        );
        self.schedule(
            Duration::from_secs(self.config.scan_timeout_secs),
            Timer::ScanCeiling { scan },
            self.scan_timers.clone(),
        );
        self.set_status("Scanning for devices");
    }

    /// Stops the radio and disarms the scan timers. Leaves `state` to the caller.
    fn stop_scanning(&mut self) {
        self.scan_timers.cancel();
        self.transport.stop_scan();
    }

    fn on_advertisement(&mut self, device_id: &str, name: &str, rssi: Option<i16>) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        if self.registry.observe(device_id, name, rssi) {
            info!("Found device {} ({}), RSSI {:?}", name, device_id, rssi);
        }
    }

    // ── Connection lifecycle ────────────────────────────────────

    fn connect(&mut self, device_id: &str) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected(_)
        ) {
            self.set_status("Already connected; disconnect first");
            return;
        }
        let Some(name) = self.registry.get(device_id).map(|d| d.name.clone()) else {
            self.set_status(format!("Unknown device {device_id}"));
            return;
        };
        if !self.radio_ready() {
            return;
        }

        if self.state == ConnectionState::Scanning {
            self.stop_scanning();
        }
        self.state = ConnectionState::Connecting;
        self.device_id = Some(device_id.to_string());
        self.transport.connect(device_id);
        self.set_status(format!("Connecting to {name}"));
    }

    fn on_connected(&mut self, device_id: &str) {
        if !self.is_session_device(device_id) {
            // A connect that finished after the caller gave up on it.
            info!("Dropping unwanted link to {}", device_id);
            self.transport.disconnect(device_id);
            return;
        }
        if self.state != ConnectionState::Connecting {
            debug!("Ignoring repeated connect event for {}", device_id);
            return;
        }
        self.state = ConnectionState::Connected(LinkState::Negotiating);
        self.transport
            .discover_services(device_id, UUID_HOTSPOT_SERVICE);
        self.set_status("Connected, discovering services");
    }

    fn on_connect_failed(&mut self, device_id: &str, reason: &str) {
        if self.state != ConnectionState::Connecting || !self.is_session_device(device_id) {
            debug!("Ignoring connect failure for {}: {}", device_id, reason);
            return;
        }
        self.reset_session();
        self.state = ConnectionState::Disconnected;
        self.set_status(format!("Connection failed: {reason}"));
    }

    fn on_services(&mut self, device_id: &str, result: Result<Vec<uuid::Uuid>, String>) {
        if !self.is_negotiating(device_id) {
            return;
        }
        match result {
            Ok(services) if services.contains(&UUID_HOTSPOT_SERVICE) => {
                self.transport.discover_characteristics(
                    device_id,
                    UUID_HOTSPOT_SERVICE,
                    UUID_HOTSPOT_CONTROL_CHAR,
                );
            }
            Ok(_) => self.degrade("Hotspot service not found on device"),
            Err(e) => self.degrade(format!("Service discovery failed: {e}")),
        }
    }

    fn on_characteristics(
        &mut self,
        device_id: &str,
        service: uuid::Uuid,
        result: Result<Vec<uuid::Uuid>, String>,
    ) {
        if !self.is_negotiating(device_id) || service != UUID_HOTSPOT_SERVICE {
            return;
        }
        match result {
            Ok(characteristics) if characteristics.contains(&UUID_HOTSPOT_CONTROL_CHAR) => {
                let target = WriteTarget {
                    service,
                    characteristic: UUID_HOTSPOT_CONTROL_CHAR,
                };
                self.transport.set_notify(&target, true);
                self.write_target = Some(target);
                self.state = ConnectionState::Connected(LinkState::Ready);
                self.set_status("Ready");
            }
            Ok(_) => self.degrade("Control characteristic not found on device"),
            Err(e) => self.degrade(format!("Characteristic discovery failed: {e}")),
        }
    }

    fn degrade(&mut self, status: impl Into<String>) {
        self.state = ConnectionState::Connected(LinkState::Degraded);
        let status = status.into();
        warn!("{}", status);
        self.set_status(status);
    }

    fn on_disconnected(&mut self, device_id: &str, reason: Option<String>) {
        if !self.is_session_device(device_id) {
            debug!("Ignoring disconnect of {}", device_id);
            return;
        }
        self.reset_session();
        self.state = ConnectionState::Disconnected;
        match reason {
            Some(reason) => self.set_status(format!("Disconnected: {reason}")),
            None => self.set_status("Disconnected"),
        }
    }

    fn disconnect(&mut self) {
        match self.state {
            ConnectionState::Scanning => {
                self.stop_scanning();
                self.state = ConnectionState::Idle;
                self.set_status("Scan stopped");
            }
            ConnectionState::Connecting | ConnectionState::Connected(_) => {
                if let Some(target) = self.write_target {
                    self.transport.set_notify(&target, false);
                }
                if let Some(device_id) = self.device_id.clone() {
                    self.transport.disconnect(&device_id);
                }
                self.reset_session();
                self.state = ConnectionState::Disconnected;
                self.set_status("Disconnected");
            }
            ConnectionState::Idle | ConnectionState::Disconnected => {
                self.set_status("Not connected");
            }
        }
    }

    /// Clears every per-connection field regardless of sub-state.
    fn reset_session(&mut self) {
        self.device_id = None;
        self.write_target = None;
        self.in_flight = None;
        self.command_timer.cancel();
    }

    // ── Commands ────────────────────────────────────────────────

    fn dispatch(&mut self, command: HotspotCommand) {
        let Some(target) = self.write_target else {
            self.set_status("Device is not ready for commands");
            return;
        };
        if self.state != ConnectionState::Connected(LinkState::Ready) {
            self.set_status("Device is not ready for commands");
            return;
        }
        if self.in_flight.is_some() {
            self.set_status("command in progress");
            return;
        }
        let now = Instant::now();
        let min_interval = Duration::from_millis(self.config.command_interval_ms);
        if let Some(last) = self.last_command_at {
            if now.duration_since(last) < min_interval {
                self.set_status("please wait");
                return;
            }
        }

        self.next_tag += 1;
        let tag = self.next_tag;
        self.in_flight = Some(tag);
        self.last_command_at = Some(now);
        self.command_timer.cancel();
        self.command_timer = CancellationToken::new();

        info!("Sending {} command", command.label());
        self.transport.write(&target, command.to_bytes(), tag);
        self.schedule(
            Duration::from_secs(self.config.command_timeout_secs),
            Timer::CommandTimeout { tag },
            self.command_timer.clone(),
        );
        self.set_status(format!("Sending {}", command.label()));
    }

    fn on_write_completed(&mut self, tag: u64, result: Result<(), String>) {
        if self.in_flight != Some(tag) {
            debug!("Ignoring acknowledgement for command {}", tag);
            return;
        }
        self.in_flight = None;
        self.command_timer.cancel();
        match result {
            Ok(()) => self.set_status("success"),
            Err(e) => self.set_status(format!("command failed: {e}")),
        }
    }

    // ── Timers ──────────────────────────────────────────────────

    fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::BroadcastFallback { scan } => {
                if self.state == ConnectionState::Scanning
                    && scan == self.scan_generation
                    && self.registry.is_empty()
                {
                    info!("Nothing found yet, adding an unfiltered scan");
                    self.transport.start_scan(None);
                }
            }
            Timer::ScanCeiling { scan } => {
                if self.state == ConnectionState::Scanning && scan == self.scan_generation {
                    self.stop_scanning();
                    self.state = ConnectionState::Idle;
                    self.set_status("scan completed");
                }
            }
            Timer::CommandTimeout { tag } => {
                if self.in_flight == Some(tag) {
                    warn!("Command {} was not acknowledged in time", tag);
                    self.in_flight = None;
                    self.set_status("command timed out");
                }
            }
        }
    }

    fn schedule(&self, delay: Duration, timer: Timer, cancel: CancellationToken) {
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = internal.send(SessionEvent::Timer(timer));
                }
            }
        });
    }

    // ── Notifications and joining ───────────────────────────────

    fn on_notification(&mut self, characteristic: uuid::Uuid, payload: &[u8]) {
        let expected = self.write_target.map(|t| t.characteristic);
        if !self.state.is_connected() || expected != Some(characteristic) {
            debug!("Ignoring notification from {}", characteristic);
            return;
        }

        match Credentials::decode(payload) {
            Ok(credentials) => {
                info!("Received credentials for {}", credentials.ssid);
                self.set_status(format!("Received credentials for {}", credentials.ssid));
                self.credentials = Some(credentials.clone());
                self.begin_join(credentials);
            }
            Err(e) => {
                debug!("Notification is not a credential record: {}", e);
                let text = String::from_utf8_lossy(payload);
                self.set_status(format!("Received: {}", text.trim()));
            }
        }
    }

    fn begin_join(&mut self, credentials: Credentials) {
        if self.joining {
            warn!(
                "A join is already in progress, not joining {}",
                credentials.ssid
            );
            return;
        }
        self.joining = true;
        self.join_status = Some(format!("joining {}", credentials.ssid));

        let joiner = self.joiner.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = joiner
                .join(&credentials.ssid, &credentials.password)
                .await;
            let _ = internal.send(SessionEvent::JoinFinished {
                ssid: credentials.ssid,
                outcome,
            });
        });
    }

    fn finish_join(&mut self, ssid: &str, outcome: JoinOutcome) {
        let message = outcome.status_message(ssid);
        match outcome {
            JoinOutcome::Failed(_) => warn!("{}", message),
            _ => info!("{}", message),
        }
        self.joining = false;
        self.join_status = Some(message.clone());
        self.set_status(message);
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn radio_ready(&mut self) -> bool {
        match self.transport.power_state() {
            PowerState::Ready => true,
            state => {
                self.set_status(format!("Bluetooth is unavailable ({state:?})"));
                false
            }
        }
    }

    fn is_session_device(&self, device_id: &str) -> bool {
        self.device_id.as_deref() == Some(device_id)
    }

    fn is_negotiating(&self, device_id: &str) -> bool {
        self.state == ConnectionState::Connected(LinkState::Negotiating)
            && self.is_session_device(device_id)
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        debug!("Status: {}", self.status);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            scanning: self.state == ConnectionState::Scanning,
            devices: self.registry.all().to_vec(),
            command_in_flight: self.in_flight.is_some(),
            status: self.status.clone(),
            credentials: self.credentials.clone(),
            joining: self.joining,
            join_status: self.join_status.clone(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn shutdown(&mut self) {
        if self.state == ConnectionState::Scanning {
            self.stop_scanning();
        }
        if let Some(device_id) = self.device_id.clone() {
            self.transport.disconnect(&device_id);
        }
        self.reset_session();
    }
}
