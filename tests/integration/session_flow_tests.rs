//! End-to-end session flows: discovery, connection lifecycle, degraded links.

use crate::mock_transport::{Harness, TransportCall};
use hotspot_remote_lib::commands;
use hotspot_remote_lib::core::bluetooth::{
    PowerState, TransportEvent, UUID_HOTSPOT_CONTROL_CHAR, UUID_HOTSPOT_SERVICE,
};
use hotspot_remote_lib::core::network::JoinOutcome;
use hotspot_remote_lib::core::session::{ConnectionState, LinkState, Session};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn scan_connect_enable_ack_disconnect() {
    let h = Harness::start();

    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
    assert_eq!(
        h.calls(),
        vec![TransportCall::StartScan(Some(UUID_HOTSPOT_SERVICE))]
    );

    h.advertise("d1", "Pixel");
    h.advertise("d2", "Galaxy");
    h.advertise("d1", "Pixel");
    let snapshot = h.until(|s| s.devices.len() == 2).await;
    let ids: Vec<&str> = snapshot.devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["d1", "d2"]);

    commands::connect_to_device("d1".into(), &h.app).unwrap();
    let snapshot = h.until(|s| s.state == ConnectionState::Connecting).await;
    assert!(!snapshot.scanning);

    h.emit(TransportEvent::Connected {
        device_id: "d1".into(),
    });
    h.until(|s| s.state == ConnectionState::Connected(LinkState::Negotiating))
        .await;
    h.emit(TransportEvent::ServicesDiscovered {
        device_id: "d1".into(),
        result: Ok(vec![UUID_HOTSPOT_SERVICE]),
    });
    h.emit(TransportEvent::CharacteristicsDiscovered {
        device_id: "d1".into(),
        service: UUID_HOTSPOT_SERVICE,
        result: Ok(vec![UUID_HOTSPOT_CONTROL_CHAR]),
    });
    h.until(|s| s.state == ConnectionState::Connected(LinkState::Ready))
        .await;

    let calls = h.calls();
    assert_eq!(
        &calls[1..],
        &[
            TransportCall::StopScan,
            TransportCall::Connect("d1".into()),
            TransportCall::DiscoverServices("d1".into(), UUID_HOTSPOT_SERVICE),
            TransportCall::DiscoverCharacteristics(
                "d1".into(),
                UUID_HOTSPOT_SERVICE,
                UUID_HOTSPOT_CONTROL_CHAR
            ),
            TransportCall::SetNotify(true),
        ]
    );

    commands::enable_hotspot(&h.app).unwrap();
    h.until(|s| s.command_in_flight).await;
    let writes = h.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, vec![0x01]);

    h.emit(TransportEvent::WriteCompleted {
        tag: writes[0].1,
        result: Ok(()),
    });
    let snapshot = h.until(|s| !s.command_in_flight).await;
    assert_eq!(snapshot.status, "success");

    commands::disconnect(&h.app).unwrap();
    let snapshot = h.until(|s| s.state == ConnectionState::Disconnected).await;
    assert!(!snapshot.command_in_flight);
    assert!(h.calls().contains(&TransportCall::Disconnect("d1".into())));
}

#[tokio::test(start_paused = true)]
async fn scan_ceiling_with_no_devices_returns_to_idle() {
    let h = Harness::start();
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;

    let snapshot = h
        .wait_for(Duration::from_secs(60), |s| s.status == "scan completed")
        .await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(!snapshot.scanning);
    assert!(snapshot.devices.is_empty());

    let calls = h.calls();
    assert_eq!(
        calls,
        vec![
            TransportCall::StartScan(Some(UUID_HOTSPOT_SERVICE)),
            TransportCall::StartScan(None),
            TransportCall::StopScan,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn new_scan_clears_previous_devices() {
    let h = Harness::start();
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
    h.advertise("d1", "Pixel");
    h.until(|s| s.devices.len() == 1).await;

    commands::disconnect(&h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Idle).await;

    commands::start_scan(&h.app).unwrap();
    let snapshot = h.until(|s| s.scanning && s.devices.is_empty()).await;
    assert_eq!(snapshot.status, "Scanning for devices");
}

#[tokio::test(start_paused = true)]
async fn radio_unavailable_is_reported_without_scanning() {
    let h = Harness::with(PowerState::Unavailable, JoinOutcome::Joined);
    commands::start_scan(&h.app).unwrap();
    let snapshot = h.until(|s| s.status.contains("unavailable")).await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(h.calls().is_empty());

    *h.power.lock().unwrap() = PowerState::Ready;
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
}

#[tokio::test(start_paused = true)]
async fn connect_failure_can_be_retried() {
    let h = Harness::start();
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
    h.advertise("d1", "Pixel");
    h.until(|s| s.devices.len() == 1).await;

    commands::connect_to_device("d1".into(), &h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Connecting).await;
    h.emit(TransportEvent::ConnectFailed {
        device_id: "d1".into(),
        reason: "timeout".into(),
    });
    let snapshot = h.until(|s| s.state == ConnectionState::Disconnected).await;
    assert_eq!(snapshot.status, "Connection failed: timeout");

    // The registry from the finished scan is still usable.
    commands::connect_to_device("d1".into(), &h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Connecting).await;
}

#[tokio::test(start_paused = true)]
async fn missing_service_is_degraded_not_disconnected() {
    let h = Harness::start();
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
    h.advertise("d1", "Pixel");
    h.until(|s| s.devices.len() == 1).await;
    commands::connect_to_device("d1".into(), &h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Connecting).await;

    h.emit(TransportEvent::Connected {
        device_id: "d1".into(),
    });
    h.emit(TransportEvent::ServicesDiscovered {
        device_id: "d1".into(),
        result: Ok(vec![]),
    });
    let snapshot = h
        .until(|s| s.state == ConnectionState::Connected(LinkState::Degraded))
        .await;
    assert!(snapshot.status.contains("not found"));

    commands::enable_hotspot(&h.app).unwrap();
    h.until(|s| s.status == "Device is not ready for commands").await;
    assert!(h.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn peer_disconnect_clears_in_flight_command() {
    let h = Harness::start();
    h.ready().await;

    commands::enable_hotspot(&h.app).unwrap();
    h.until(|s| s.command_in_flight).await;

    h.emit(TransportEvent::Disconnected {
        device_id: "d1".into(),
        reason: Some("link lost".into()),
    });
    let snapshot = h.until(|s| s.state == ConnectionState::Disconnected).await;
    assert!(!snapshot.command_in_flight);
    assert_eq!(snapshot.status, "Disconnected: link lost");

    commands::disable_hotspot(&h.app).unwrap();
    h.until(|s| s.status == "Device is not ready for commands").await;
    assert_eq!(h.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn events_for_other_devices_are_ignored() {
    let h = Harness::start();
    h.ready().await;

    h.emit(TransportEvent::Disconnected {
        device_id: "someone-else".into(),
        reason: None,
    });
    commands::enable_hotspot(&h.app).unwrap();
    let snapshot = h.until(|s| s.command_in_flight).await;
    assert_eq!(
        snapshot.state,
        ConnectionState::Connected(LinkState::Ready)
    );
}

fn disconnects_of(h: &Harness, device_id: &str) -> usize {
    h.calls()
        .iter()
        .filter(|c| **c == TransportCall::Disconnect(device_id.to_string()))
        .count()
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connecting_releases_a_late_link() {
    let h = Harness::start();
    commands::start_scan(&h.app).unwrap();
    h.until(|s| s.scanning).await;
    h.advertise("d1", "Pixel");
    h.until(|s| s.devices.len() == 1).await;
    commands::connect_to_device("d1".into(), &h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Connecting).await;

    commands::disconnect(&h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Disconnected).await;
    assert_eq!(disconnects_of(&h, "d1"), 1);

    // The radio finishes the abandoned connect afterwards.
    h.emit(TransportEvent::Connected {
        device_id: "d1".into(),
    });
    h.emit(TransportEvent::ConnectFailed {
        device_id: "d1".into(),
        reason: "timeout".into(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(disconnects_of(&h, "d1"), 2);
    assert!(
        !h.calls()
            .iter()
            .any(|c| matches!(c, TransportCall::DiscoverServices(..)))
    );
    let snapshot = h.app.session_handle().snapshot();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.status, "Disconnected");

    // The session can still connect again.
    commands::connect_to_device("d1".into(), &h.app).unwrap();
    h.until(|s| s.state == ConnectionState::Connecting).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_before_returning() {
    let h = Harness::start();
    h.ready().await;

    let Harness { app, calls, .. } = h;
    app.shutdown(Duration::from_secs(1)).await.unwrap();

    let calls = calls.lock().unwrap().clone();
    assert!(calls.contains(&TransportCall::Disconnect("d1".into())));
}

#[tokio::test]
async fn actor_stops_when_handles_are_dropped() {
    let (_events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let (session, handle) = Session::new(
        Default::default(),
        NullTransport,
        events_rx,
        Arc::new(NullJoiner),
    );
    let task = tokio::spawn(session.run());
    drop(handle);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("session did not stop")
        .unwrap();
}

struct NullTransport;

impl hotspot_remote_lib::core::transport::Transport for NullTransport {
    fn power_state(&self) -> PowerState {
        PowerState::Ready
    }
    fn start_scan(&mut self, _service_filter: Option<uuid::Uuid>) {}
    fn stop_scan(&mut self) {}
    fn connect(&mut self, _device_id: &str) {}
    fn disconnect(&mut self, _device_id: &str) {}
    fn discover_services(&mut self, _device_id: &str, _service: uuid::Uuid) {}
    fn discover_characteristics(
        &mut self,
        _device_id: &str,
        _service: uuid::Uuid,
        _characteristic: uuid::Uuid,
    ) {
    }
    fn write(
        &mut self,
        _target: &hotspot_remote_lib::core::bluetooth::WriteTarget,
        _payload: Vec<u8>,
        _tag: u64,
    ) {
    }
    fn set_notify(
        &mut self,
        _target: &hotspot_remote_lib::core::bluetooth::WriteTarget,
        _enabled: bool,
    ) {
    }
}

struct NullJoiner;

#[async_trait::async_trait]
impl hotspot_remote_lib::core::network::NetworkJoiner for NullJoiner {
    async fn join(&self, _ssid: &str, _passphrase: &str) -> JoinOutcome {
        JoinOutcome::Joined
    }
}
