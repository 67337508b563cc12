//! Network link for a Linux host
//!
//! A host is usually already on a network, so "connecting" means proving
//! that the broker (or a configured probe address) is reachable over TCP.
//! Once up, the link is re-probed every `recheck_interval` so a lost route
//! is noticed by the supervisor.

use super::NetworkLink;
use crate::config::AgentConfig;
use crate::transport::mqtt::parse_broker_url;
use std::cell::Cell;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MACHINE_ID_PATH: &str = "/etc/machine-id";
const UNKNOWN_HARDWARE_ID: &str = "unknown-device";

/// [`NetworkLink`] backed by TCP reachability checks
#[derive(Debug)]
pub struct HostLink {
    probe_target: Option<String>,
    probe_timeout: Duration,
    recheck_interval: Duration,
    hardware_id: String,
    connected: Cell<bool>,
    last_check: Cell<Option<Instant>>,
    local_address: Cell<Option<SocketAddr>>,
}

impl HostLink {
    pub fn new(
        probe_target: Option<String>,
        probe_timeout: Duration,
        recheck_interval: Duration,
        hardware_id: String,
    ) -> Self {
        Self {
            probe_target,
            probe_timeout,
            recheck_interval,
            hardware_id,
            connected: Cell::new(false),
            last_check: Cell::new(None),
            local_address: Cell::new(None),
        }
    }

    /// Probe `network.probe_addr`, or the broker endpoint when none is set
    pub fn from_config(config: &AgentConfig) -> Self {
        let probe_target = config.network.probe_addr.clone().or_else(|| {
            parse_broker_url(&config.mqtt.broker_url)
                .ok()
                .map(|endpoint| endpoint.authority())
        });

        Self::new(
            probe_target,
            Duration::from_millis(config.network.probe_timeout_ms),
            Duration::from_millis(config.network.recheck_interval_ms),
            resolve_hardware_id(config.device.hardware_id.as_deref(), Path::new(MACHINE_ID_PATH)),
        )
    }

    pub fn probe_target(&self) -> Option<&str> {
        self.probe_target.as_deref()
    }

    fn probe(&self) -> std::io::Result<SocketAddr> {
        let target = self.probe_target.as_deref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no probe address configured")
        })?;

        let mut last_error = None;
        for addr in target.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.probe_timeout) {
                Ok(stream) => return stream.local_addr(),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{target} resolved to no addresses"),
            )
        }))
    }

    fn record_probe(&self, result: std::io::Result<SocketAddr>) -> bool {
        self.last_check.set(Some(Instant::now()));
        match result {
            Ok(local) => {
                self.local_address.set(Some(local));
                self.connected.set(true);
                true
            }
            Err(e) => {
                debug!(target = ?self.probe_target, error = %e, "Reachability probe failed");
                self.connected.set(false);
                false
            }
        }
    }
}

impl NetworkLink for HostLink {
    fn connect(&mut self, ssid: &str, _password: &str) -> bool {
        if self.probe_target.is_none() {
            warn!("No probe address available, network link cannot be verified");
            return false;
        }
        debug!(ssid = %ssid, target = ?self.probe_target, "Probing network reachability");
        let result = self.probe();
        self.record_probe(result)
    }

    fn is_connected(&self) -> bool {
        if !self.connected.get() {
            return false;
        }

        let due = self
            .last_check
            .get()
            .map_or(true, |at| at.elapsed() >= self.recheck_interval);
        if due {
            let result = self.probe();
            return self.record_probe(result);
        }
        true
    }

    fn local_address(&self) -> String {
        self.local_address
            .get()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    fn hardware_id(&self) -> String {
        self.hardware_id.clone()
    }
}

/// Pick the device identity: explicit override, machine id, then hostname
pub fn resolve_hardware_id(configured: Option<&str>, machine_id_path: &Path) -> String {
    if let Some(id) = configured.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    if let Ok(contents) = std::fs::read_to_string(machine_id_path) {
        let id = contents.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    std::env::var("HOSTNAME")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HARDWARE_ID.to_string())
}
