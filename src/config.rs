//! Runtime configuration. Built once by the embedding application and passed
//! to components at construction; nothing reads process-global state.

use std::path::PathBuf;
use std::time::Duration;

/// Settings shared across discovery, drivers, and persistence.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Path of the SQLite database holding credentials and app-id caches.
    pub db_path: PathBuf,
    /// Budget for one multicast-probe (SSDP) scan.
    pub ssdp_timeout: Duration,
    /// Budget for one service-advertisement (mDNS) scan.
    pub mdns_timeout: Duration,
    /// Per-request budget on the pairing transport.
    pub request_timeout: Duration,
    /// Emit verbose per-command timing logs.
    pub verbose: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("uniremote.db"),
            ssdp_timeout: Duration::from_secs(3),
            mdns_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            verbose: false,
        }
    }
}

impl RemoteConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = RemoteConfig::default();
        assert_eq!(config.ssdp_timeout, Duration::from_secs(3));
        assert_eq!(config.mdns_timeout, Duration::from_secs(3));
        assert!(!config.verbose);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RemoteConfig::default()
            .with_db_path("/tmp/remote-test.db")
            .with_verbose(true);
        assert_eq!(config.db_path, PathBuf::from("/tmp/remote-test.db"));
        assert!(config.verbose);
    }
}
