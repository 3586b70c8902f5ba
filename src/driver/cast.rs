//! Chromecast boundary driver. Declares the casting surface; the CASTV2
//! sender protocol itself lives outside this crate.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

pub struct CastDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
}

impl CastDriver {
    pub fn new(device: DeviceRecord) -> Self {
        let capabilities = [Capability::Casting, Capability::Launcher]
            .into_iter()
            .collect();
        Self {
            device,
            capabilities,
        }
    }
}

#[async_trait]
impl TvDriver for CastDriver {
    fn device(&self) -> &DeviceRecord {
        &self.device
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        Ok(())
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
