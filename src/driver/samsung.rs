//! Samsung Tizen boundary driver. The Tizen WebSocket pairing flow (port
//! 8002, token exchange) is not implemented here; connect reports that
//! pairing is required.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

pub struct SamsungTizenDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
}

impl SamsungTizenDriver {
    pub fn new(device: DeviceRecord) -> Self {
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
        }
    }
}

#[async_trait]
impl TvDriver for SamsungTizenDriver {
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
