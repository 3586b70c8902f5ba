//! Universal TV remote engine. Discovers streaming boxes and smart TVs on the
//! local network, routes commands through capability-declared drivers, and
//! maintains the paired webOS session with its credential and app-id stores.

pub mod config;
pub mod driver;
pub mod error;
pub mod http;
pub mod model;
pub mod scanner;
pub mod store;

pub use config::RemoteConfig;
pub use driver::{CommandRouter, DriverRegistry, TvDriver};
pub use error::RemoteError;
pub use model::{
    Capability, DeviceKind, DeviceRecord, MediaKind, PairingKind, PairingState, RemoteCommand,
    StreamingApp,
};
pub use scanner::CompositeDiscovery;
