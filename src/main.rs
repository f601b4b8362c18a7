use anyhow::Result;
use hotspot_remote_lib::config::SessionConfig;
use hotspot_remote_lib::state::AppState;
use hotspot_remote_lib::{commands, logging};
use log::{LevelFilter, info, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const HELP: &str = "commands: scan | devices | connect <index|id> | enable | disable | disconnect | status | quit";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(LevelFilter::Info);

    let config_path = SessionConfig::default_path()?;
    let config = SessionConfig::load_config(&config_path).await?;
    let app_state = AppState::new(config).await?;

    // Print every status change
    let mut snapshots = app_state.session_handle().subscribe();
    tokio::spawn(async move {
        let mut last_status = String::new();
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.status != last_status {
                println!("[{:?}] {}", snapshot.state, snapshot.status);
                last_status = snapshot.status;
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let result = match words.next() {
            Some("scan") => commands::start_scan(&app_state),
            Some("devices") => {
                for (index, device) in commands::list_devices(&app_state).iter().enumerate() {
                    println!("{index}: {} ({}) RSSI {:?}", device.name, device.id, device.rssi);
                }
                Ok(())
            }
            Some("connect") => match words.next() {
                Some(target) => {
                    let devices = commands::list_devices(&app_state);
                    let device_id = target
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| devices.get(index))
                        .map(|device| device.id.clone())
                        .unwrap_or_else(|| target.to_string());
                    commands::connect_to_device(device_id, &app_state)
                }
                None => Err("usage: connect <index|id>".to_string()),
            },
            Some("enable") => commands::enable_hotspot(&app_state),
            Some("disable") => commands::disable_hotspot(&app_state),
            Some("disconnect") => commands::disconnect(&app_state),
            Some("status") => {
                let snapshot = commands::session_snapshot(&app_state);
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                Ok(())
            }
            Some("quit") => break,
            Some(_) => Err(HELP.to_string()),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!("{}", e);
        }
    }

    // Dropping the session disconnects and waits for the radio to let go.
    if let Err(e) = app_state.shutdown(SHUTDOWN_TIMEOUT).await {
        warn!("{}", e);
    }
    info!("Exiting");
    Ok(())
}
