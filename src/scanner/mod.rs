//! Device discovery. Two independent time-bounded scanners (SSDP multicast
//! probe and mDNS service browsing) plus a composite that runs both
//! concurrently and deduplicates the merged results.

pub mod composite;
pub mod mdns;
pub mod ssdp;

pub use composite::CompositeDiscovery;
pub use mdns::MdnsScanner;
pub use ssdp::SsdpScanner;
