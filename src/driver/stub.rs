//! Placeholder driver for unclassified devices. Declares nothing and rejects
//! everything.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

pub struct StubDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
}

impl StubDriver {
    pub fn new(device: DeviceRecord) -> Self {
        Self {
            device,
            capabilities: HashSet::new(),
        }
    }
}

#[async_trait]
impl TvDriver for StubDriver {
    fn device(&self) -> &DeviceRecord {
        &self.device
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
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
