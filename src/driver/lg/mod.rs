//! LG webOS driver. Commands ride the paired SSAP session: service URIs for
//! the request/response operations, pointer-socket button frames for the
//! physical keys.

pub mod protocol;
pub mod resolver;
pub mod session;

pub use resolver::{InstalledApp, LgAppResolver};
pub use session::{LgSession, SsapClient};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::driver::TvDriver;
use crate::driver::lg::protocol::{SsapRequest, uri};
use crate::error::RemoteError;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};
use crate::store::{AppCacheStore, SecretStore};

/// How one command reaches the TV.
enum Dispatch {
    Request(SsapRequest),
    Button(&'static str),
    Digit(u8),
}

pub struct LgWebOsDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
    session: LgSession,
    resolver: LgAppResolver<LgSession>,
}

impl LgWebOsDriver {
    pub fn new(
        device: DeviceRecord,
        config: RemoteConfig,
        secrets: SecretStore,
        app_cache: AppCacheStore,
    ) -> Self {
        let session = LgSession::spawn(device.clone(), &config, secrets);
        let resolver = LgAppResolver::new(session.clone(), app_cache);
        let capabilities = [
            Capability::Power,
            Capability::Navigation,
            Capability::Volume,
            Capability::Mute,
            Capability::Playback,
            Capability::Channel,
            Capability::TextInput,
            Capability::Launcher,
        ]
        .into_iter()
        .collect();
        Self {
            device,
            capabilities,
            session,
            resolver,
        }
    }

    /// The long-lived pairing session, for callers that drive the pairing
    /// flow (state observation, PIN entry, credential removal).
    pub fn session(&self) -> &LgSession {
        &self.session
    }

    pub fn resolver(&self) -> &LgAppResolver<LgSession> {
        &self.resolver
    }

    /// Command binding. The auxiliary keys (settings, list, ad/sap) map to
    /// their nearest physical button; that approximation mirrors the remote,
    /// not a documented platform contract.
    fn dispatch_for(command: RemoteCommand) -> Result<Dispatch, RemoteError> {
        let dispatch = match command {
            RemoteCommand::Power => Dispatch::Request(SsapRequest::new(uri::TURN_OFF)),
            RemoteCommand::VolumeUp => Dispatch::Request(SsapRequest::new(uri::VOLUME_UP)),
            RemoteCommand::VolumeDown => Dispatch::Request(SsapRequest::new(uri::VOLUME_DOWN)),
            RemoteCommand::PlayPause | RemoteCommand::Play => {
                Dispatch::Request(SsapRequest::new(uri::PLAY))
            }
            RemoteCommand::Pause => Dispatch::Request(SsapRequest::new(uri::PAUSE)),
            RemoteCommand::FastForward => Dispatch::Request(SsapRequest::new(uri::FAST_FORWARD)),
            RemoteCommand::Rewind => Dispatch::Request(SsapRequest::new(uri::REWIND)),
            RemoteCommand::ChannelUp => Dispatch::Request(SsapRequest::new(uri::CHANNEL_UP)),
            RemoteCommand::ChannelDown => Dispatch::Request(SsapRequest::new(uri::CHANNEL_DOWN)),
            RemoteCommand::Input => Dispatch::Request(SsapRequest::new(uri::SWITCH_INPUT)),
            RemoteCommand::Ok => Dispatch::Request(SsapRequest::new(uri::SEND_ENTER)),
            RemoteCommand::Up => Dispatch::Button("UP"),
            RemoteCommand::Down => Dispatch::Button("DOWN"),
            RemoteCommand::Left => Dispatch::Button("LEFT"),
            RemoteCommand::Right => Dispatch::Button("RIGHT"),
            RemoteCommand::Home => Dispatch::Button("HOME"),
            RemoteCommand::Back => Dispatch::Button("BACK"),
            RemoteCommand::Menu => Dispatch::Button("MENU"),
            RemoteCommand::Settings => Dispatch::Button("QMENU"),
            RemoteCommand::List => Dispatch::Button("LIST"),
            RemoteCommand::AdSap => Dispatch::Button("CC"),
            RemoteCommand::Mute => Dispatch::Button("MUTE"),
            RemoteCommand::Digit(n) => {
                if n > 9 {
                    return Err(RemoteError::Unsupported);
                }
                Dispatch::Digit(n)
            }
        };
        Ok(dispatch)
    }
}

#[async_trait]
impl TvDriver for LgWebOsDriver {
    fn device(&self) -> &DeviceRecord {
        &self.device
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        self.session.ensure_ready(None).await
    }

    async fn disconnect(&self) {
        self.session.disconnect();
    }

    async fn send(&self, command: RemoteCommand) -> Result<(), RemoteError> {
        let dispatch = Self::dispatch_for(command)?;
        self.session.ensure_ready(None).await?;
        match dispatch {
            Dispatch::Request(request) => {
                self.session.request(request).await?;
                Ok(())
            }
            Dispatch::Button(name) => self.session.button(name).await,
            Dispatch::Digit(n) => self.session.button(&n.to_string()).await,
        }
    }

    async fn send_text(&self, text: &str) -> Result<(), RemoteError> {
        if text.is_empty() {
            return Ok(());
        }
        self.session.ensure_ready(None).await?;
        self.session.request(SsapRequest::insert_text(text)).await?;
        self.session
            .request(SsapRequest::new(uri::SEND_ENTER))
            .await?;
        Ok(())
    }

    async fn launch(&self, app: StreamingApp) -> Result<(), RemoteError> {
        self.session.ensure_ready(None).await?;
        self.resolver.launch(app).await
    }

    async fn cast_media(
        &self,
        _media_url: &url::Url,
        _kind: MediaKind,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bindings() {
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::VolumeUp),
            Ok(Dispatch::Request(request)) if request.uri == uri::VOLUME_UP
        ));
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::Left),
            Ok(Dispatch::Button("LEFT"))
        ));
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::Ok),
            Ok(Dispatch::Request(request)) if request.uri == uri::SEND_ENTER
        ));
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::Digit(4)),
            Ok(Dispatch::Digit(4))
        ));
    }

    #[test]
    fn test_auxiliary_keys_bind_to_nearest_button() {
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::Settings),
            Ok(Dispatch::Button("QMENU"))
        ));
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::List),
            Ok(Dispatch::Button("LIST"))
        ));
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::AdSap),
            Ok(Dispatch::Button("CC"))
        ));
    }

    #[test]
    fn test_digit_out_of_range_rejected() {
        assert!(matches!(
            LgWebOsDriver::dispatch_for(RemoteCommand::Digit(11)),
            Err(RemoteError::Unsupported)
        ));
    }
}
