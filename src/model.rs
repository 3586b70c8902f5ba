//! Shared types for device control. Defines the device record produced by
//! discovery, the capability vocabulary, remote commands, and launchable apps.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform kind inferred from discovery responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Roku,
    Chromecast,
    LgWebOs,
    SamsungTizen,
    SonyBravia,
    DlnaGeneric,
    Unknown,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Roku => write!(f, "roku"),
            DeviceKind::Chromecast => write!(f, "chromecast"),
            DeviceKind::LgWebOs => write!(f, "lg_webos"),
            DeviceKind::SamsungTizen => write!(f, "samsung_tizen"),
            DeviceKind::SonyBravia => write!(f, "sony_bravia"),
            DeviceKind::DlnaGeneric => write!(f, "dlna_generic"),
            DeviceKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A device found on the local network.
///
/// Identity for deduplication purposes is `(ip_address, kind)`: two discovery
/// events for the same address and inferred kind are the same device, whatever
/// name each protocol reported. Records are immutable; a later scan that finds
/// the same key produces a new record rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub name: String,
    pub ip_address: String,
    pub port: Option<u16>,
    pub kind: DeviceKind,
    pub metadata: HashMap<String, String>,
}

impl DeviceRecord {
    pub fn new(
        name: impl Into<String>,
        ip_address: impl Into<String>,
        port: Option<u16>,
        kind: DeviceKind,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ip_address: ip_address.into(),
            port,
            kind,
            metadata,
        }
    }
}

impl PartialEq for DeviceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.ip_address == other.ip_address && self.kind == other.kind
    }
}

impl Eq for DeviceRecord {}

impl Hash for DeviceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip_address.hash(state);
        self.kind.hash(state);
    }
}

/// A feature a driver declares support for. Each driver exposes a fixed set
/// for its lifetime; the router uses it to flag suspicious dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Power,
    Navigation,
    Volume,
    Mute,
    Playback,
    Channel,
    TextInput,
    Launcher,
    Casting,
    Touchpad,
    Voice,
}

/// A remote control command, uniform across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Power,
    Digit(u8),
    Home,
    Back,
    Ok,
    Up,
    Down,
    Left,
    Right,
    Menu,
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    Play,
    Pause,
    FastForward,
    Rewind,
    ChannelUp,
    ChannelDown,
    Settings,
    Input,
    List,
    AdSap,
}

impl RemoteCommand {
    /// Capability a driver should declare to handle this command.
    ///
    /// Digits and the auxiliary keys (settings, input, list, ad/sap) have no
    /// dedicated capability; they map to the nearest match. Digits are channel
    /// entry, the rest ride on navigation.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            RemoteCommand::Power => Some(Capability::Power),
            RemoteCommand::Home
            | RemoteCommand::Back
            | RemoteCommand::Ok
            | RemoteCommand::Up
            | RemoteCommand::Down
            | RemoteCommand::Left
            | RemoteCommand::Right
            | RemoteCommand::Menu => Some(Capability::Navigation),
            RemoteCommand::VolumeUp | RemoteCommand::VolumeDown => Some(Capability::Volume),
            RemoteCommand::Mute => Some(Capability::Mute),
            RemoteCommand::PlayPause
            | RemoteCommand::Play
            | RemoteCommand::Pause
            | RemoteCommand::FastForward
            | RemoteCommand::Rewind => Some(Capability::Playback),
            RemoteCommand::ChannelUp | RemoteCommand::ChannelDown | RemoteCommand::Digit(_) => {
                Some(Capability::Channel)
            }
            RemoteCommand::Settings
            | RemoteCommand::Input
            | RemoteCommand::List
            | RemoteCommand::AdSap => Some(Capability::Navigation),
        }
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteCommand::Digit(n) => write!(f, "digit({})", n),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// Logical streaming app a caller can ask any launcher-capable device to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingApp {
    Netflix,
    Youtube,
    PrimeVideo,
    DisneyPlus,
    AppleTv,
    Hulu,
}

impl StreamingApp {
    pub const ALL: [StreamingApp; 6] = [
        StreamingApp::Netflix,
        StreamingApp::Youtube,
        StreamingApp::PrimeVideo,
        StreamingApp::DisneyPlus,
        StreamingApp::AppleTv,
        StreamingApp::Hulu,
    ];

    /// Stable key used for cache storage.
    pub fn key(&self) -> &'static str {
        match self {
            StreamingApp::Netflix => "netflix",
            StreamingApp::Youtube => "youtube",
            StreamingApp::PrimeVideo => "prime_video",
            StreamingApp::DisneyPlus => "disney_plus",
            StreamingApp::AppleTv => "apple_tv",
            StreamingApp::Hulu => "hulu",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|app| app.key() == key)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StreamingApp::Netflix => "Netflix",
            StreamingApp::Youtube => "YouTube",
            StreamingApp::PrimeVideo => "Prime Video",
            StreamingApp::DisneyPlus => "Disney+",
            StreamingApp::AppleTv => "Apple TV",
            StreamingApp::Hulu => "Hulu",
        }
    }
}

impl std::fmt::Display for StreamingApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Media category for casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Lifecycle of a pairing-capable connection.
///
/// Process-local only; the credential derived from a successful registration
/// is the only persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Disconnected,
    Connecting,
    AwaitingPrompt,
    AwaitingPin,
    Registering,
    Ready,
    Error(String),
}

/// Handshake mode requested from a pairing-capable TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingKind {
    Prompt,
    Pin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(ip: &str, kind: DeviceKind, name: &str) -> DeviceRecord {
        DeviceRecord::new(name, ip, None, kind, HashMap::new())
    }

    #[test]
    fn test_equality_ignores_name_and_port() {
        let a = record("192.168.1.10", DeviceKind::Roku, "Living Room");
        let mut b = record("192.168.1.10", DeviceKind::Roku, "Roku Ultra");
        b.port = Some(8060);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_kind_distinct_device() {
        let a = record("192.168.1.10", DeviceKind::Roku, "a");
        let b = record("192.168.1.10", DeviceKind::LgWebOs, "a");
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_collapses_same_key() {
        let mut set = HashSet::new();
        set.insert(record("192.168.1.10", DeviceKind::Roku, "first"));
        set.insert(record("192.168.1.10", DeviceKind::Roku, "second"));
        set.insert(record("192.168.1.11", DeviceKind::Roku, "third"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_digit_maps_to_channel_capability() {
        assert_eq!(
            RemoteCommand::Digit(5).required_capability(),
            Some(Capability::Channel)
        );
    }

    #[test]
    fn test_auxiliary_keys_map_to_navigation() {
        for cmd in [
            RemoteCommand::Settings,
            RemoteCommand::Input,
            RemoteCommand::List,
            RemoteCommand::AdSap,
        ] {
            assert_eq!(cmd.required_capability(), Some(Capability::Navigation));
        }
    }

    #[test]
    fn test_streaming_app_key_roundtrip() {
        for app in StreamingApp::ALL {
            assert_eq!(StreamingApp::from_key(app.key()), Some(app));
        }
        assert_eq!(StreamingApp::from_key("vhs"), None);
    }
}
