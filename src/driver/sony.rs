//! Sony Bravia boundary driver. The Bravia JSON-RPC surface ("/sony/system")
//! is consumed through the shared HTTP client when implemented; connect
//! reports that pairing is required.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::http::HttpClient;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

pub struct SonyBraviaDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
    #[allow(dead_code)]
    http: HttpClient,
}

impl SonyBraviaDriver {
    pub fn new(device: DeviceRecord, http: HttpClient) -> Self {
        let capabilities = [
            Capability::Navigation,
            Capability::Volume,
            Capability::Mute,
            Capability::Launcher,
        ]
        .into_iter()
        .collect();
        Self {
            device,
            capabilities,
            http,
        }
    }
}

#[async_trait]
impl TvDriver for SonyBraviaDriver {
    fn device(&self) -> &DeviceRecord {
        &self.device
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        Err(RemoteError::PairingRequired)
    }

    async fn disconnect(&self) {}

    async fn send(&self, _command: RemoteCommand) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
    }

    async fn send_text(&self, _text: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
    }

    async fn launch(&self, _app: StreamingApp) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
    }

    async fn cast_media(
        &self,
        _media_url: &url::Url,
        _kind: MediaKind,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
    }
}
