//! Driver contract and registry. Every platform backend implements
//! [`TvDriver`]; the registry is a closed table from device kind to
//! constructor, extended by adding a variant and an arm, never by runtime
//! type discovery.

mod cast;
mod dlna;
pub mod lg;
mod roku;
mod router;
mod samsung;
mod sony;
mod stub;

pub use cast::CastDriver;
pub use dlna::DlnaGenericDriver;
pub use lg::LgWebOsDriver;
pub use roku::RokuDriver;
pub use router::CommandRouter;
pub use samsung::SamsungTizenDriver;
pub use sony::SonyBraviaDriver;
pub use stub::StubDriver;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::http::HttpClient;
use crate::model::{Capability, DeviceKind, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};
use crate::store::{AppCacheStore, SecretStore};

/// Uniform contract for a device backend.
///
/// A driver that does not implement an operation for its platform returns
/// [`RemoteError::Unsupported`] rather than silently doing nothing; the
/// capability set it exposes is fixed for its lifetime.
#[async_trait]
pub trait TvDriver: Send + Sync {
    fn device(&self) -> &DeviceRecord;
    fn capabilities(&self) -> &HashSet<Capability>;

    async fn connect(&self) -> Result<(), RemoteError>;
    async fn disconnect(&self);
    async fn send(&self, command: RemoteCommand) -> Result<(), RemoteError>;
    async fn send_text(&self, text: &str) -> Result<(), RemoteError>;
    async fn launch(&self, app: StreamingApp) -> Result<(), RemoteError>;
    async fn cast_media(&self, media_url: &url::Url, kind: MediaKind) -> Result<(), RemoteError>;
}

/// Selects and instantiates a driver per discovered device. HTTP-based
/// drivers share one client; the LG driver gets the credential and app-id
/// stores it needs for pairing and resolution.
pub struct DriverRegistry {
    config: RemoteConfig,
    http: HttpClient,
    secrets: SecretStore,
    app_cache: AppCacheStore,
}

impl DriverRegistry {
    pub fn new(config: RemoteConfig) -> Self {
        let secrets = SecretStore::new(&config.db_path);
        let app_cache = AppCacheStore::new(&config.db_path);
        Self {
            config,
            http: HttpClient::default(),
            secrets,
            app_cache,
        }
    }

    pub fn driver(&self, device: &DeviceRecord) -> Box<dyn TvDriver> {
        match device.kind {
            DeviceKind::Roku => Box::new(RokuDriver::new(device.clone(), self.http.clone())),
            DeviceKind::Chromecast => Box::new(CastDriver::new(device.clone())),
            DeviceKind::LgWebOs => Box::new(LgWebOsDriver::new(
                device.clone(),
                self.config.clone(),
                self.secrets.clone(),
                self.app_cache.clone(),
            )),
            DeviceKind::SamsungTizen => Box::new(SamsungTizenDriver::new(device.clone())),
            DeviceKind::SonyBravia => {
                Box::new(SonyBraviaDriver::new(device.clone(), self.http.clone()))
            }
            DeviceKind::DlnaGeneric => {
                Box::new(DlnaGenericDriver::new(device.clone(), self.http.clone()))
            }
            DeviceKind::Unknown => Box::new(StubDriver::new(device.clone())),
        }
    }

    /// Convenience: a router wrapping the driver selected for `device`.
    pub fn router(&self, device: &DeviceRecord) -> CommandRouter {
        CommandRouter::new(self.driver(device), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn registry() -> (tempfile::TempDir, DriverRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let config = RemoteConfig::default().with_db_path(dir.path().join("test.db"));
        (dir, DriverRegistry::new(config))
    }

    fn device(kind: DeviceKind) -> DeviceRecord {
        DeviceRecord::new("test", "192.168.1.50", None, kind, HashMap::new())
    }

    #[tokio::test]
    async fn test_registry_selects_by_kind() {
        let (_dir, registry) = registry();
        let roku = registry.driver(&device(DeviceKind::Roku));
        assert!(roku.capabilities().contains(&Capability::Launcher));

        let unknown = registry.driver(&device(DeviceKind::Unknown));
        assert!(unknown.capabilities().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_driver_rejects_everything() {
        let (_dir, registry) = registry();
        let driver = registry.driver(&device(DeviceKind::Unknown));
        assert_eq!(
            driver.send(RemoteCommand::Power).await,
            Err(RemoteError::Unsupported)
        );
        assert_eq!(
            driver.send_text("hello").await,
            Err(RemoteError::Unsupported)
        );
    }
}
