//! Mock adapters for integration tests.
//!
//! Records every transport call so tests can assert on the full history, and
//! lets tests inject transport events as if the radio had produced them.

use async_trait::async_trait;
use hotspot_remote_lib::config::SessionConfig;
use hotspot_remote_lib::core::SessionSnapshot;
use hotspot_remote_lib::core::bluetooth::{
    PowerState, TransportEvent, UUID_HOTSPOT_CONTROL_CHAR, UUID_HOTSPOT_SERVICE, WriteTarget,
};
use hotspot_remote_lib::core::network::{JoinOutcome, NetworkJoiner};
use hotspot_remote_lib::core::transport::Transport;
use hotspot_remote_lib::state::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    StartScan(Option<Uuid>),
    StopScan,
    Connect(String),
    Disconnect(String),
    DiscoverServices(String, Uuid),
    DiscoverCharacteristics(String, Uuid, Uuid),
    Write { payload: Vec<u8>, tag: u64 },
    SetNotify(bool),
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    power: Arc<Mutex<PowerState>>,
}

impl MockTransport {
    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for MockTransport {
    fn power_state(&self) -> PowerState {
        *self.power.lock().unwrap()
    }

    fn start_scan(&mut self, service_filter: Option<Uuid>) {
        self.record(TransportCall::StartScan(service_filter));
    }

    fn stop_scan(&mut self) {
        self.record(TransportCall::StopScan);
    }

    fn connect(&mut self, device_id: &str) {
        self.record(TransportCall::Connect(device_id.to_string()));
    }

    fn disconnect(&mut self, device_id: &str) {
        self.record(TransportCall::Disconnect(device_id.to_string()));
    }

    fn discover_services(&mut self, device_id: &str, service: Uuid) {
        self.record(TransportCall::DiscoverServices(device_id.to_string(), service));
    }

    fn discover_characteristics(&mut self, device_id: &str, service: Uuid, characteristic: Uuid) {
        self.record(TransportCall::DiscoverCharacteristics(
            device_id.to_string(),
            service,
            characteristic,
        ));
    }

    fn write(&mut self, _target: &WriteTarget, payload: Vec<u8>, tag: u64) {
        self.record(TransportCall::Write { payload, tag });
    }

    fn set_notify(&mut self, _target: &WriteTarget, enabled: bool) {
        self.record(TransportCall::SetNotify(enabled));
    }
}

// ── MockJoiner ────────────────────────────────────────────────

pub struct MockJoiner {
    pub joins: Arc<Mutex<Vec<(String, String)>>>,
    outcome: JoinOutcome,
}

#[async_trait]
impl NetworkJoiner for MockJoiner {
    async fn join(&self, ssid: &str, passphrase: &str) -> JoinOutcome {
        self.joins
            .lock()
            .unwrap()
            .push((ssid.to_string(), passphrase.to_string()));
        self.outcome.clone()
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub app: AppState,
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    pub power: Arc<Mutex<PowerState>>,
    pub joins: Arc<Mutex<Vec<(String, String)>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[allow(dead_code)]
impl Harness {
    pub fn start() -> Self {
        Self::with(PowerState::Ready, JoinOutcome::Joined)
    }

    pub fn with(power: PowerState, outcome: JoinOutcome) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let power = Arc::new(Mutex::new(power));
        let joins = Arc::new(Mutex::new(Vec::new()));
        let (events, events_rx) = mpsc::unbounded_channel();

        let transport = MockTransport {
            calls: calls.clone(),
            power: power.clone(),
        };
        let joiner = Arc::new(MockJoiner {
            joins: joins.clone(),
            outcome,
        });
        let app = AppState::with_parts(SessionConfig::default(), transport, events_rx, joiner);

        Self {
            app,
            calls,
            power,
            joins,
            events,
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }

    pub fn advertise(&self, device_id: &str, name: &str) {
        self.emit(TransportEvent::Advertisement {
            device_id: device_id.to_string(),
            name: Some(name.to_string()),
            rssi: Some(-55),
        });
    }

    /// Waits until the published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        limit: Duration,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = self.app.session_handle().subscribe();
        let snapshot = tokio::time::timeout(limit, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for session state")
            .expect("session stopped");
        snapshot.clone()
    }

    pub async fn until(&self, predicate: impl FnMut(&SessionSnapshot) -> bool) -> SessionSnapshot {
        self.wait_for(Duration::from_secs(1), predicate).await
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(Vec<u8>, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Write { payload, tag } => Some((payload, tag)),
                _ => None,
            })
            .collect()
    }

    /// Scans, finds `d1` and negotiates the control characteristic.
    pub async fn ready(&self) {
        let session = self.app.session_handle();
        session.start_scan().unwrap();
        self.until(|s| s.scanning).await;
        self.advertise("d1", "Pixel");
        self.until(|s| s.devices.len() == 1).await;

        session.connect("d1").unwrap();
        self.until(|s| s.state == hotspot_remote_lib::core::session::ConnectionState::Connecting)
            .await;
        self.emit(TransportEvent::Connected {
            device_id: "d1".into(),
        });
        self.emit(TransportEvent::ServicesDiscovered {
            device_id: "d1".into(),
            result: Ok(vec![UUID_HOTSPOT_SERVICE]),
        });
        self.emit(TransportEvent::CharacteristicsDiscovered {
            device_id: "d1".into(),
            service: UUID_HOTSPOT_SERVICE,
            result: Ok(vec![UUID_HOTSPOT_CONTROL_CHAR]),
        });
        self.until(|s| s.status == "Ready").await;
    }

    pub fn notify(&self, payload: &[u8]) {
        self.emit(TransportEvent::Notification {
            characteristic: UUID_HOTSPOT_CONTROL_CHAR,
            payload: payload.to_vec(),
        });
    }
}
