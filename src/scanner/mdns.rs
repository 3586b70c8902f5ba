//! mDNS/DNS-SD scanner. Browses one session per well-known service type and
//! resolves advertisements to host/port/name records. A browse failure on one
//! service type never aborts the others.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use mdns_sd::{ResolvedService, ServiceDaemon, ServiceEvent};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{DeviceKind, DeviceRecord};

/// Service types browsed by this system. The trailing dot is required by the
/// mDNS daemon.
const SERVICE_TYPES: [&str; 2] = ["_roku._tcp.local.", "_googlecast._tcp.local."];

/// Service-advertisement scanner. One scan per instance at a time; a new scan
/// cancels the in-flight one, which finalizes with its partial results.
pub struct MdnsScanner {
    active: Mutex<Option<CancellationToken>>,
}

impl MdnsScanner {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Browse all service types concurrently for up to `timeout`, returning
    /// every advertisement that resolved before the deadline.
    pub async fn scan(&self, scan_timeout: Duration) -> Vec<DeviceRecord> {
        if scan_timeout.is_zero() {
            return Vec::new();
        }

        let token = self.supersede();

        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(err) => {
                warn!(target: "uniremote::discovery", error = %err, "mdns daemon unavailable");
                return Vec::new();
            }
        };

        info!(
            target: "uniremote::discovery",
            timeout_secs = scan_timeout.as_secs_f64(),
            "mdns scan started"
        );

        let deadline = Instant::now() + scan_timeout;
        let (roku, cast) = tokio::join!(
            browse_service_type(&daemon, SERVICE_TYPES[0], deadline, &token),
            browse_service_type(&daemon, SERVICE_TYPES[1], deadline, &token),
        );

        for service_type in SERVICE_TYPES {
            if let Err(err) = daemon.stop_browse(service_type) {
                debug!(target: "uniremote::discovery", error = %err, "mdns stop_browse failed");
            }
        }
        let _ = daemon.shutdown();

        let mut results: HashSet<DeviceRecord> = HashSet::new();
        results.extend(roku);
        results.extend(cast);

        info!(
            target: "uniremote::discovery",
            devices = results.len(),
            "mdns scan finished"
        );
        results.into_iter().collect()
    }

    fn supersede(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slot = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(token.clone()) {
            previous.cancel();
        }
        token
    }
}

impl Default for MdnsScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// One independent browse session. A terminal error here aborts only this
/// service type; partial results survive.
async fn browse_service_type(
    daemon: &ServiceDaemon,
    service_type: &str,
    deadline: Instant,
    token: &CancellationToken,
) -> Vec<DeviceRecord> {
    let receiver = match daemon.browse(service_type) {
        Ok(receiver) => receiver,
        Err(err) => {
            warn!(
                target: "uniremote::discovery",
                service_type,
                error = %err,
                "mdns browse failed"
            );
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let remaining = deadline - now;

        tokio::select! {
            _ = token.cancelled() => {
                debug!(target: "uniremote::discovery", service_type, "mdns browse superseded");
                break;
            }
            event = timeout(remaining, receiver.recv_async()) => {
                match event {
                    Ok(Ok(ServiceEvent::ServiceResolved(service_info))) => {
                        if let Some(record) = build_record(service_type, &service_info) {
                            debug!(
                                target: "uniremote::discovery",
                                service_type,
                                ip = %record.ip_address,
                                "mdns service resolved"
                            );
                            records.push(record);
                        }
                    }
                    Ok(Ok(ServiceEvent::SearchStopped(_))) => break,
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        warn!(
                            target: "uniremote::discovery",
                            service_type,
                            error = %err,
                            "mdns browse session error"
                        );
                        break;
                    }
                    Err(_) => break, // deadline elapsed
                }
            }
        }
    }
    records
}

fn build_record(service_type: &str, service_info: &ResolvedService) -> Option<DeviceRecord> {
    let mut host = service_info.get_hostname().to_string();
    if host.ends_with('.') {
        host.pop();
    }
    let host = host.trim_end_matches(".local").to_string();

    // Prefer a resolved IPv4 address; fall back to the advertised hostname.
    let ip_address = service_info
        .get_addresses()
        .iter()
        .map(|addr| addr.to_ip_addr())
        .find(|addr| addr.is_ipv4())
        .map(|addr| addr.to_string())
        .unwrap_or(host);
    if ip_address.is_empty() {
        return None;
    }

    let name = service_info
        .get_fullname()
        .strip_suffix(&format!(".{}", service_type))
        .unwrap_or(service_info.get_fullname())
        .to_string();

    let kind = infer_kind(service_type);
    let mut metadata = HashMap::new();
    metadata.insert("BONJOUR_TYPE".to_string(), service_type.to_string());

    Some(DeviceRecord::new(
        name,
        ip_address,
        Some(service_info.get_port()),
        kind,
        metadata,
    ))
}

fn infer_kind(service_type: &str) -> DeviceKind {
    if service_type.contains("roku") {
        DeviceKind::Roku
    } else if service_type.contains("googlecast") {
        DeviceKind::Chromecast
    } else {
        DeviceKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_kind_from_service_type() {
        assert_eq!(infer_kind("_roku._tcp.local."), DeviceKind::Roku);
        assert_eq!(infer_kind("_googlecast._tcp.local."), DeviceKind::Chromecast);
        assert_eq!(infer_kind("_airplay._tcp.local."), DeviceKind::Unknown);
    }

    #[tokio::test]
    async fn test_zero_timeout_returns_immediately() {
        let scanner = MdnsScanner::new();
        let devices = scanner.scan(Duration::ZERO).await;
        assert!(devices.is_empty());
    }
}
