//! Composite discovery. Runs the multicast-probe and service-advertisement
//! scanners concurrently and merges their outputs into a deduplicated set
//! keyed by (address, kind), multicast-probe records winning on collision.

use crate::config::RemoteConfig;
use crate::model::DeviceRecord;
use crate::scanner::{MdnsScanner, SsdpScanner};

pub struct CompositeDiscovery {
    config: RemoteConfig,
    ssdp: SsdpScanner,
    mdns: MdnsScanner,
}

impl CompositeDiscovery {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            ssdp: SsdpScanner::new(),
            mdns: MdnsScanner::new(),
        }
    }

    /// Scan with both protocols concurrently. Each scanner runs on its own
    /// timeout clock; neither can cancel the other.
    pub async fn scan(&self) -> Vec<DeviceRecord> {
        let (ssdp_devices, mdns_devices) = futures::join!(
            self.ssdp.scan(self.config.ssdp_timeout),
            self.mdns.scan(self.config.mdns_timeout),
        );
        merge(ssdp_devices, mdns_devices)
    }
}

/// Deduplicate by (address, kind). The multicast-probe record carries the
/// richer metadata set, so on collision the service-advertisement record is
/// discarded outright, not merged field by field.
pub fn merge(ssdp: Vec<DeviceRecord>, mdns: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    let mut merged: Vec<DeviceRecord> = Vec::new();
    for device in ssdp.into_iter().chain(mdns) {
        if !merged.contains(&device) {
            merged.push(device);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceKind;
    use std::collections::HashMap;

    fn record(ip: &str, kind: DeviceKind, name: &str) -> DeviceRecord {
        DeviceRecord::new(name, ip, None, kind, HashMap::new())
    }

    #[test]
    fn test_merge_keeps_multicast_record_on_collision() {
        let mut ssdp_record = record("192.168.1.10", DeviceKind::Roku, "Roku (ssdp)");
        ssdp_record
            .metadata
            .insert("ST".to_string(), "roku:ecp".to_string());
        let mdns_record = record("192.168.1.10", DeviceKind::Roku, "Roku (mdns)");

        let merged = merge(vec![ssdp_record], vec![mdns_record]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Roku (ssdp)");
        assert!(merged[0].metadata.contains_key("ST"));
    }

    #[test]
    fn test_merge_size_is_distinct_key_count() {
        let ssdp = vec![
            record("192.168.1.10", DeviceKind::Roku, "a"),
            record("192.168.1.11", DeviceKind::LgWebOs, "b"),
        ];
        let mdns = vec![
            record("192.168.1.10", DeviceKind::Roku, "a-again"),
            record("192.168.1.12", DeviceKind::Chromecast, "c"),
            record("192.168.1.10", DeviceKind::Chromecast, "same ip, new kind"),
        ];
        let merged = merge(ssdp, mdns);
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_merge_of_disjoint_sets_keeps_everything() {
        let ssdp = vec![record("192.168.1.20", DeviceKind::DlnaGeneric, "tv")];
        let mdns = vec![record("192.168.1.21", DeviceKind::Roku, "stick")];
        assert_eq!(merge(ssdp, mdns).len(), 2);
    }
}
