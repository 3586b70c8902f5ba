//! Generic DLNA boundary driver. UPnP renderers need no pairing; the SOAP
//! AVTransport casting calls are outside this crate's surface.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::http::HttpClient;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

pub struct DlnaGenericDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
    #[allow(dead_code)]
    http: HttpClient,
}

impl DlnaGenericDriver {
    pub fn new(device: DeviceRecord, http: HttpClient) -> Self {
        let capabilities = [Capability::Casting].into_iter().collect();
        Self {
            device,
            capabilities,
            http,
        }
    }
}

#[async_trait]
impl TvDriver for DlnaGenericDriver {
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
