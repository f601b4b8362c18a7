//! Joining the network shared by the companion device.
//! The OS facility is reached through [`NetworkJoiner`] so the session never
//! depends on a particular platform tool.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tokio::process::Command;

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
static CURRENT_NETWORK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Current (?:Wi-Fi|AirPort) Network: (.+)").ok());

/// Result of a join attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    Failed(String),
}

impl JoinOutcome {
    /// Human readable status for the given network
    pub fn status_message(&self, ssid: &str) -> String {
        match self {
            Self::Joined => format!("connected to {ssid}"),
            Self::AlreadyJoined => format!("already connected to {ssid}"),
            Self::Failed(reason) => format!("failed to join {ssid}: {reason}"),
        }
    }
}

/// Network-join service consumed by the session
#[async_trait]
pub trait NetworkJoiner: Send + Sync {
    async fn join(&self, ssid: &str, passphrase: &str) -> JoinOutcome;
}

/// Joins through the platform's Wi-Fi tooling: `networksetup` on macOS,
/// NetworkManager's `nmcli` elsewhere.
#[derive(Debug, Clone, Default)]
pub struct SystemNetworkJoiner {
    interface: Option<String>,
}

impl SystemNetworkJoiner {
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }

    #[cfg(target_os = "macos")]
    fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("en0")
    }

    #[cfg(target_os = "macos")]
    async fn current_ssid(&self) -> Result<Option<String>> {
        let out = Command::new("networksetup")
            .args(["-getairportnetwork", self.interface()])
            .output()
            .await
            .context("failed to execute networksetup -getairportnetwork")?;
        Ok(parse_networksetup_current(&String::from_utf8_lossy(&out.stdout)))
    }

    #[cfg(target_os = "macos")]
    async fn associate(&self, ssid: &str, passphrase: &str) -> Result<()> {
        let out = Command::new("networksetup")
            .args(["-setairportnetwork", self.interface(), ssid, passphrase])
            .output()
            .await
            .context("failed to execute networksetup -setairportnetwork")?;
        // networksetup exits 0 on most failures and reports them on stdout.
        let stdout = String::from_utf8_lossy(&out.stdout);
        if let Some(reason) = networksetup_join_error(&stdout) {
            return Err(anyhow!(reason));
        }
        if !out.status.success() {
            return Err(anyhow!(
                "networksetup exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    async fn current_ssid(&self) -> Result<Option<String>> {
        let out = Command::new("nmcli")
            .args(["-t", "-f", "ACTIVE,SSID", "device", "wifi"])
            .output()
            .await
            .context("failed to execute nmcli device wifi")?;
        if !out.status.success() {
            return Err(anyhow!(
                "nmcli exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(parse_nmcli_active(&String::from_utf8_lossy(&out.stdout)))
    }

    #[cfg(not(target_os = "macos"))]
    async fn associate(&self, ssid: &str, passphrase: &str) -> Result<()> {
        let mut cmd = Command::new("nmcli");
        cmd.args(["device", "wifi", "connect", ssid, "password", passphrase]);
        if let Some(interface) = &self.interface {
            cmd.args(["ifname", interface]);
        }
        let out = cmd
            .output()
            .await
            .context("failed to execute nmcli device wifi connect")?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let reason = stderr.trim().trim_start_matches("Error:").trim();
            return Err(anyhow!(if reason.is_empty() {
                format!("nmcli exited with {}", out.status)
            } else {
                reason.to_string()
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkJoiner for SystemNetworkJoiner {
    async fn join(&self, ssid: &str, passphrase: &str) -> JoinOutcome {
        match self.current_ssid().await {
            Ok(Some(current)) if current == ssid => {
                info!("Already associated with {}", ssid);
                return JoinOutcome::AlreadyJoined;
            }
            Ok(current) => debug!("Currently associated with {:?}", current),
            Err(e) => warn!("Could not determine the current network: {}", e),
        }

        info!("Joining network {}", ssid);
        match self.associate(ssid, passphrase).await {
            Ok(()) => JoinOutcome::Joined,
            Err(e) => JoinOutcome::Failed(e.to_string()),
        }
    }
}

/// Extracts the SSID from `networksetup -getairportnetwork` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_networksetup_current(output: &str) -> Option<String> {
    CURRENT_NETWORK
        .as_ref()?
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Finds the failure line in `networksetup -setairportnetwork` output, if any.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn networksetup_join_error(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| {
            line.starts_with("Could not find network")
                || line.starts_with("Failed to join network")
                || line.starts_with("Error")
        })
        .map(str::to_string)
}

/// Extracts the active SSID from `nmcli -t -f ACTIVE,SSID device wifi` output.
#[cfg_attr(target_os = "macos", allow(dead_code))]
pub(crate) fn parse_nmcli_active(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("yes:"))
        .map(|ssid| ssid.replace("\\:", ":"))
        .filter(|s| !s.is_empty())
}
