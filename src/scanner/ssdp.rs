//! SSDP scanner. Sends a multicast M-SEARCH query and parses the HTTP-style
//! header blocks devices send back, inferring a platform kind from the
//! search-target, USN, and server headers.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{DeviceKind, DeviceRecord};

const MULTICAST_ADDR: &str = "239.255.255.250:1900";
const LG_SERVICE_TYPE: &str = "urn:lge-com:service:webos-second-screen:1";
const FALLBACK_SEARCH_TARGET: &str = "ssdp:all";
/// Reply-free window after which the catch-all query is sent once.
const FALLBACK_GRACE: Duration = Duration::from_secs(1);
const LG_CONTROL_PORT: u16 = 3001;

/// Multicast-probe scanner. One scan per instance at a time; starting a new
/// scan cancels the one in flight, which finalizes with its partial results.
pub struct SsdpScanner {
    active: Mutex<Option<CancellationToken>>,
}

impl SsdpScanner {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Discover devices responding to M-SEARCH within `timeout`.
    ///
    /// Never fails: an unusable network path, a socket error, or an empty
    /// reply window all produce an empty (or partial) result set.
    pub async fn scan(&self, scan_timeout: Duration) -> Vec<DeviceRecord> {
        if scan_timeout.is_zero() {
            return Vec::new();
        }

        if !has_usable_ipv4() {
            warn!(target: "uniremote::discovery", "ssdp scan skipped: no usable IPv4 network path");
            return Vec::new();
        }

        let token = self.supersede();

        let socket = match open_search_socket() {
            Ok(socket) => socket,
            Err(err) => {
                warn!(target: "uniremote::discovery", error = %err, "ssdp socket setup failed");
                return Vec::new();
            }
        };

        info!(
            target: "uniremote::discovery",
            timeout_secs = scan_timeout.as_secs_f64(),
            "ssdp scan started"
        );

        if let Err(err) = send_search(&socket, LG_SERVICE_TYPE).await {
            warn!(target: "uniremote::discovery", error = %err, "ssdp search send failed");
            return Vec::new();
        }

        let started = Instant::now();
        let deadline = started + scan_timeout;
        let fallback_deadline = started + FALLBACK_GRACE;
        let mut fallback_sent = false;
        let mut responses_received = 0u32;
        let mut results: HashSet<DeviceRecord> = HashSet::new();
        let mut buf = [0u8; 8_192];

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if !fallback_sent && responses_received == 0 && now >= fallback_deadline {
                debug!(target: "uniremote::discovery", "ssdp fallback search: {}", FALLBACK_SEARCH_TARGET);
                if let Err(err) = send_search(&socket, FALLBACK_SEARCH_TARGET).await {
                    warn!(target: "uniremote::discovery", error = %err, "ssdp fallback send failed");
                }
                fallback_sent = true;
            }

            // Wake at whichever comes first: scan deadline or the pending
            // fallback deadline.
            let mut wait = deadline - now;
            if !fallback_sent && responses_received == 0 && fallback_deadline > now {
                wait = wait.min(fallback_deadline - now);
            }

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(target: "uniremote::discovery", "ssdp scan superseded, returning partial results");
                    break;
                }
                received = timeout(wait, socket.recv_from(&mut buf)) => {
                    match received {
                        Ok(Ok((len, src))) => {
                            responses_received += 1;
                            let payload = String::from_utf8_lossy(&buf[..len]);
                            let headers = parse_headers(&payload);
                            match build_record(&headers, src.ip()) {
                                Some(record) => {
                                    results.insert(record);
                                }
                                None => {
                                    debug!(
                                        target: "uniremote::discovery",
                                        source = %src,
                                        "ssdp reply discarded: no resolvable location"
                                    );
                                }
                            }
                        }
                        Ok(Err(err)) => {
                            warn!(target: "uniremote::discovery", error = %err, "ssdp receive error");
                            break;
                        }
                        Err(_) => {
                            // recv window elapsed; loop to re-check deadlines
                        }
                    }
                }
            }
        }

        info!(
            target: "uniremote::discovery",
            responses = responses_received,
            devices = results.len(),
            "ssdp scan finished"
        );
        results.into_iter().collect()
    }

    /// Cancel any in-flight scan and install a fresh token for this one.
    fn supersede(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slot = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(token.clone()) {
            previous.cancel();
        }
        token
    }
}

impl Default for SsdpScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn has_usable_ipv4() -> bool {
    matches!(local_ip_address::local_ip(), Ok(IpAddr::V4(addr)) if !addr.is_loopback())
}

fn open_search_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    // UPnP 1.0 recommends a multicast TTL of 4
    socket.set_multicast_ttl_v4(4)?;
    socket.set_nonblocking(true)?;
    let bind_addr: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
    socket.bind(&bind_addr.into())?;
    UdpSocket::from_std(socket.into())
}

async fn send_search(socket: &UdpSocket, search_target: &str) -> std::io::Result<()> {
    let message = format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {}\r\n\r\n",
        search_target
    );
    info!(target: "uniremote::discovery", st = search_target, "ssdp search sent");
    socket.send_to(message.as_bytes(), MULTICAST_ADDR).await?;
    Ok(())
}

/// Parse an HTTP-style header block into a map with upper-cased keys and
/// whitespace-trimmed values. Lines without a colon (including the status
/// line) are skipped.
pub fn parse_headers(payload: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in payload.split("\r\n") {
        if let Some(colon) = line.find(':') {
            let key = line[..colon].trim().to_uppercase();
            let value = line[colon + 1..].trim().to_string();
            if !key.is_empty() {
                headers.insert(key, value);
            }
        }
    }
    headers
}

/// Infer the platform kind from the combined search-target, USN, and server
/// headers, most specific signature first so a vendor match always beats the
/// generic DLNA/UPnP classification.
pub fn infer_kind(st: &str, usn: &str, server: &str) -> DeviceKind {
    let lower = format!("{}{}{}", st, usn, server).to_lowercase();
    if lower.contains("roku") {
        return DeviceKind::Roku;
    }
    if lower.contains("google") || lower.contains("chromecast") {
        return DeviceKind::Chromecast;
    }
    if lower.contains(LG_SERVICE_TYPE) || lower.contains("webos") {
        return DeviceKind::LgWebOs;
    }
    if lower.contains("samsung") {
        return DeviceKind::SamsungTizen;
    }
    if lower.contains("sony") || lower.contains("bravia") {
        return DeviceKind::SonyBravia;
    }
    if lower.contains("dlna") || lower.contains("upnp") {
        return DeviceKind::DlnaGeneric;
    }
    DeviceKind::Unknown
}

/// Build a device record from parsed reply headers. Returns `None` when
/// neither the LOCATION header nor the reply source yields a host.
pub fn build_record(headers: &HashMap<String, String>, source: IpAddr) -> Option<DeviceRecord> {
    let st = headers.get("ST").map(String::as_str).unwrap_or("");
    let usn = headers.get("USN").map(String::as_str).unwrap_or("");
    let server = headers.get("SERVER").map(String::as_str).unwrap_or("");
    let location = headers.get("LOCATION").map(String::as_str).unwrap_or("");

    let kind = infer_kind(st, usn, server);

    let location_url = url::Url::parse(location).ok();
    let host = location_url
        .as_ref()
        .and_then(|url| url.host_str())
        .map(str::to_string)
        .or_else(|| {
            if location.is_empty() && headers.is_empty() {
                None
            } else {
                Some(source.to_string())
            }
        })?;

    let port = if kind == DeviceKind::LgWebOs {
        Some(LG_CONTROL_PORT)
    } else {
        location_url.as_ref().and_then(|url| url.port())
    };

    let name = if kind == DeviceKind::LgWebOs {
        "LG webOS TV".to_string()
    } else {
        headers
            .get("SERVER")
            .or_else(|| headers.get("LOCATION"))
            .cloned()
            .unwrap_or_else(|| "SSDP device".to_string())
    };

    if kind == DeviceKind::LgWebOs {
        info!(
            target: "uniremote::discovery",
            ip = %host,
            st = st,
            "lg webos tv detected"
        );
    }

    Some(DeviceRecord::new(name, host, port, kind, headers.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers_uppercases_keys_and_trims_values() {
        let payload = "ST: roku:ecp\r\nLOCATION: http://192.168.1.2:8060\r\n";
        let headers = parse_headers(payload);
        assert_eq!(headers.get("ST").map(String::as_str), Some("roku:ecp"));
        assert_eq!(
            headers.get("LOCATION").map(String::as_str),
            Some("http://192.168.1.2:8060")
        );
    }

    #[test]
    fn test_parse_headers_is_case_and_whitespace_insensitive() {
        let payload = "HTTP/1.1 200 OK\r\nst :  upnp:rootdevice \r\nServer:Linux UPnP/1.0\r\n\r\n";
        let headers = parse_headers(payload);
        assert_eq!(headers.get("ST").map(String::as_str), Some("upnp:rootdevice"));
        assert_eq!(
            headers.get("SERVER").map(String::as_str),
            Some("Linux UPnP/1.0")
        );
        assert!(!headers.contains_key("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_infer_kind_priority_order() {
        assert_eq!(infer_kind("roku:ecp", "", ""), DeviceKind::Roku);
        assert_eq!(infer_kind("", "", "Chromecast/1.0"), DeviceKind::Chromecast);
        assert_eq!(
            infer_kind("urn:lge-com:service:webos-second-screen:1", "", ""),
            DeviceKind::LgWebOs
        );
        // vendor signature beats the generic UPnP match even when both appear
        assert_eq!(
            infer_kind("upnp:rootdevice", "uuid:1234::webos", "Linux UPnP/1.0"),
            DeviceKind::LgWebOs
        );
        assert_eq!(
            infer_kind("upnp:rootdevice", "", "Samsung AllShare Server"),
            DeviceKind::SamsungTizen
        );
        assert_eq!(
            infer_kind("upnp:rootdevice", "", "Linux DLNADOC/1.50"),
            DeviceKind::DlnaGeneric
        );
        assert_eq!(infer_kind("", "", ""), DeviceKind::Unknown);
    }

    #[test]
    fn test_build_record_uses_location_host() {
        let headers = parse_headers(
            "ST: roku:ecp\r\nUSN: uuid:roku:ecp:X00100\r\nLOCATION: http://192.168.1.2:8060/\r\n",
        );
        let record = build_record(&headers, "192.168.1.99".parse().unwrap()).unwrap();
        assert_eq!(record.ip_address, "192.168.1.2");
        assert_eq!(record.port, Some(8060));
        assert_eq!(record.kind, DeviceKind::Roku);
    }

    #[test]
    fn test_build_record_falls_back_to_source_address() {
        let headers = parse_headers("ST: upnp:rootdevice\r\nSERVER: Linux UPnP/1.0\r\n");
        let record = build_record(&headers, "192.168.1.7".parse().unwrap()).unwrap();
        assert_eq!(record.ip_address, "192.168.1.7");
        assert_eq!(record.kind, DeviceKind::DlnaGeneric);
    }

    #[test]
    fn test_build_record_forces_lg_control_port_and_name() {
        let headers = parse_headers(
            "ST: urn:lge-com:service:webos-second-screen:1\r\nLOCATION: http://192.168.1.5:1837/\r\n",
        );
        let record = build_record(&headers, "192.168.1.5".parse().unwrap()).unwrap();
        assert_eq!(record.port, Some(3001));
        assert_eq!(record.name, "LG webOS TV");
        assert_eq!(record.kind, DeviceKind::LgWebOs);
    }

    #[test]
    fn test_build_record_rejects_empty_reply() {
        let headers = HashMap::new();
        assert!(build_record(&headers, "192.168.1.5".parse().unwrap()).is_none());
    }

    #[test]
    fn test_record_metadata_carries_raw_headers() {
        let headers = parse_headers("ST: roku:ecp\r\nLOCATION: http://192.168.1.2:8060/\r\n");
        let record = build_record(&headers, "192.168.1.2".parse().unwrap()).unwrap();
        assert_eq!(
            record.metadata.get("ST").map(String::as_str),
            Some("roku:ecp")
        );
    }

    #[tokio::test]
    async fn test_zero_timeout_returns_immediately() {
        let scanner = SsdpScanner::new();
        let devices = scanner.scan(Duration::ZERO).await;
        assert!(devices.is_empty());
    }
}
