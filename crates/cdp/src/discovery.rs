//! Local port discovery.
//!
//! An instance is its own Electron process started with a
//! `--remote-debugging-port`. We find it by scanning process command
//! lines and keep only ports that answer a liveness probe.

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, TcpListener};

use async_trait::async_trait;
use regex::Regex;
use lhremote_core::error::ServiceError;

use crate::api::CdpApi;

/// Finds the debug port of the running account instance, if any.
#[async_trait]
pub trait PortDiscovery: Send + Sync {
    /// Port of a live instance other than the launcher's, or `None`.
    async fn discover_instance_port(&self, launcher_port: u16) -> Result<Option<u16>, ServiceError>;
}

/// [`PortDiscovery`] over the OS process table.
#[derive(Debug, Clone, Default)]
pub struct ProcessPortDiscovery;

impl ProcessPortDiscovery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortDiscovery for ProcessPortDiscovery {
    async fn discover_instance_port(&self, launcher_port: u16) -> Result<Option<u16>, ServiceError> {
        let listing = process_listing().await?;
        for port in parse_debug_ports(&listing, launcher_port) {
            if CdpApi::new(port).probe().await {
                tracing::debug!(launcher_port, port, "Discovered instance port");
                return Ok(Some(port));
            }
        }
        Ok(None)
    }
}

/// Distinct `--remote-debugging-port` values in a process listing,
/// ascending, excluding `exclude`.
pub fn parse_debug_ports(listing: &str, exclude: u16) -> Vec<u16> {
    let Ok(pattern) = Regex::new(r"--remote-debugging-port=(\d+)") else {
        return Vec::new();
    };
    pattern
        .captures_iter(listing)
        .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
        .filter(|&port| port != exclude && port != 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Ask the OS for an unused local TCP port.
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(unix)]
async fn process_listing() -> Result<String, ServiceError> {
    run_listing("ps", &["-A", "-o", "args="]).await
}

#[cfg(windows)]
async fn process_listing() -> Result<String, ServiceError> {
    run_listing(
        "powershell",
        &[
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_Process | Select-Object -ExpandProperty CommandLine",
        ],
    )
    .await
}

async fn run_listing(program: &str, args: &[&str]) -> Result<String, ServiceError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        tracing::warn!(program, status = %output.status, "Process listing failed");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
