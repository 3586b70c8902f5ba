//! Roku ECP driver. One-shot HTTP keypresses and launches on port 8060; no
//! pairing and no connection state.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::http::HttpClient;
use crate::model::{Capability, DeviceRecord, MediaKind, RemoteCommand, StreamingApp};

const DEFAULT_PORT: u16 = 8060;

pub struct RokuDriver {
    device: DeviceRecord,
    capabilities: HashSet<Capability>,
    http: HttpClient,
}

impl RokuDriver {
    pub fn new(device: DeviceRecord, http: HttpClient) -> Self {
        let capabilities = [
            Capability::Power,
            Capability::Volume,
            Capability::Mute,
            Capability::Navigation,
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
            http,
        }
    }

    fn base_url(&self) -> String {
        let port = self.device.port.unwrap_or(DEFAULT_PORT);
        format!("http://{}:{}", self.device.ip_address, port)
    }

    /// ECP key name for a command. Play/pause collapse onto the single ECP
    /// Play toggle.
    fn key_name(command: RemoteCommand) -> Result<String, RemoteError> {
        let key = match command {
            RemoteCommand::Power => "Power",
            RemoteCommand::Home => "Home",
            RemoteCommand::Back => "Back",
            RemoteCommand::Ok => "Select",
            RemoteCommand::Up => "Up",
            RemoteCommand::Down => "Down",
            RemoteCommand::Left => "Left",
            RemoteCommand::Right => "Right",
            RemoteCommand::Menu => "Info",
            RemoteCommand::VolumeUp => "VolumeUp",
            RemoteCommand::VolumeDown => "VolumeDown",
            RemoteCommand::Mute => "VolumeMute",
            RemoteCommand::PlayPause | RemoteCommand::Play | RemoteCommand::Pause => "Play",
            RemoteCommand::FastForward => "Fwd",
            RemoteCommand::Rewind => "Rev",
            RemoteCommand::ChannelUp => "ChannelUp",
            RemoteCommand::ChannelDown => "ChannelDown",
            RemoteCommand::Digit(n) => {
                if n > 9 {
                    return Err(RemoteError::Unsupported);
                }
                return Ok(format!("Lit_{}", n));
            }
            RemoteCommand::Settings
            | RemoteCommand::Input
            | RemoteCommand::List
            | RemoteCommand::AdSap => return Err(RemoteError::Unsupported),
        };
        Ok(key.to_string())
    }

    fn channel_id(app: StreamingApp) -> Option<&'static str> {
        match app {
            StreamingApp::Netflix => Some("12"),
            StreamingApp::PrimeVideo => Some("13"),
            StreamingApp::Youtube => Some("837"),
            StreamingApp::DisneyPlus => Some("291097"),
            StreamingApp::AppleTv => Some("551012"),
            StreamingApp::Hulu => Some("2285"),
        }
    }
}

#[async_trait]
impl TvDriver for RokuDriver {
    fn device(&self) -> &DeviceRecord {
        &self.device
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        // ECP accepts commands without any pairing handshake.
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send(&self, command: RemoteCommand) -> Result<(), RemoteError> {
        let key = Self::key_name(command)?;
        let url = format!("{}/keypress/{}", self.base_url(), key);
        self.http.post(&url, None).await?;
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), RemoteError> {
        // ECP types one character per Lit_ keypress.
        for ch in text.chars() {
            let encoded: String = url::form_urlencoded::byte_serialize(
                ch.to_string().as_bytes(),
            )
            .collect();
            let url = format!("{}/keypress/Lit_{}", self.base_url(), encoded);
            self.http.post(&url, None).await?;
        }
        Ok(())
    }

    async fn launch(&self, app: StreamingApp) -> Result<(), RemoteError> {
        let channel = Self::channel_id(app).ok_or(RemoteError::AppNotFound)?;
        let url = format!("{}/launch/{}", self.base_url(), channel);
        self.http.post(&url, None).await?;
        Ok(())
    }

    async fn cast_media(
        &self,
        _media_url: &url::Url,
        _kind: MediaKind,
    ) -> Result<(), RemoteError> {
        // Needs a dedicated receiver channel; out of scope for ECP keypresses.
        Err(RemoteError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_for_supported_commands() {
        assert_eq!(RokuDriver::key_name(RemoteCommand::Ok).unwrap(), "Select");
        assert_eq!(RokuDriver::key_name(RemoteCommand::Menu).unwrap(), "Info");
        assert_eq!(
            RokuDriver::key_name(RemoteCommand::Mute).unwrap(),
            "VolumeMute"
        );
        assert_eq!(
            RokuDriver::key_name(RemoteCommand::PlayPause).unwrap(),
            "Play"
        );
        assert_eq!(
            RokuDriver::key_name(RemoteCommand::Digit(7)).unwrap(),
            "Lit_7"
        );
    }

    #[test]
    fn test_digit_out_of_range_rejected() {
        assert_eq!(
            RokuDriver::key_name(RemoteCommand::Digit(12)),
            Err(RemoteError::Unsupported)
        );
    }

    #[test]
    fn test_auxiliary_keys_unsupported() {
        for cmd in [
            RemoteCommand::Settings,
            RemoteCommand::Input,
            RemoteCommand::List,
            RemoteCommand::AdSap,
        ] {
            assert_eq!(RokuDriver::key_name(cmd), Err(RemoteError::Unsupported));
        }
    }
}
