//! Command-line front end: scan the network, pair with a webOS TV, and send
//! commands or launch apps on any discovered device.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use uniremote::driver::lg::LgSession;
use uniremote::store::SecretStore;
use uniremote::{
    CompositeDiscovery, DeviceKind, DeviceRecord, DriverRegistry, PairingKind, PairingState,
    RemoteCommand, RemoteConfig, RemoteError, StreamingApp,
};

#[derive(Parser)]
#[command(name = "uniremote", about = "Universal TV remote for the local network")]
struct Cli {
    /// Database file for credentials and app-id caches
    #[arg(long, default_value = "uniremote.db")]
    db: PathBuf,

    /// Verbose per-command timing logs
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover devices on the local network
    Scan {
        /// Scan budget in seconds
        #[arg(long, default_value_t = 3)]
        timeout: u64,
    },
    /// Pair with an LG webOS TV
    Pair {
        ip: String,
        /// Use PIN pairing instead of the on-screen prompt
        #[arg(long)]
        pin: bool,
    },
    /// Send a remote command
    Send {
        ip: String,
        /// Device kind (roku, lg_webos, ...)
        #[arg(long, default_value = "lg_webos")]
        kind: String,
        /// Command name (power, up, ok, volume_up, digit:3, ...)
        command: String,
    },
    /// Type text on the device
    Text {
        ip: String,
        #[arg(long, default_value = "lg_webos")]
        kind: String,
        text: String,
    },
    /// Launch a streaming app
    Launch {
        ip: String,
        #[arg(long, default_value = "lg_webos")]
        kind: String,
        /// App key (netflix, youtube, prime_video, disney_plus, apple_tv, hulu)
        app: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), RemoteError> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = RemoteConfig::default()
        .with_db_path(cli.db)
        .with_verbose(cli.verbose);

    match cli.command {
        Command::Scan { timeout } => {
            let config = RemoteConfig {
                ssdp_timeout: Duration::from_secs(timeout),
                mdns_timeout: Duration::from_secs(timeout),
                ..config
            };
            let discovery = CompositeDiscovery::new(config);
            let devices = discovery.scan().await;
            if devices.is_empty() {
                println!("no devices found");
            }
            for device in devices {
                println!(
                    "{:<16} {:<14} {} (port {})",
                    device.ip_address,
                    device.kind.to_string(),
                    device.name,
                    device
                        .port
                        .map(|port| port.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            Ok(())
        }
        Command::Pair { ip, pin } => pair(&config, &ip, pin).await,
        Command::Send { ip, kind, command } => {
            let command = parse_command(&command)?;
            let registry = DriverRegistry::new(config);
            let router = registry.router(&manual_device(&ip, &kind));
            router.send(command).await
        }
        Command::Text { ip, kind, text } => {
            let registry = DriverRegistry::new(config);
            let router = registry.router(&manual_device(&ip, &kind));
            router.send_text(&text).await
        }
        Command::Launch { ip, kind, app } => {
            let app = StreamingApp::from_key(&app).ok_or(RemoteError::AppNotFound)?;
            let registry = DriverRegistry::new(config);
            let router = registry.router(&manual_device(&ip, &kind));
            router.launch(app).await
        }
    }
}

/// Drive the interactive pairing flow, echoing prompt/PIN states and reading
/// the PIN from stdin when the TV asks for one.
async fn pair(config: &RemoteConfig, ip: &str, pin: bool) -> Result<(), RemoteError> {
    let device = manual_device(ip, "lg_webos");
    let secrets = SecretStore::new(&config.db_path);
    let session = LgSession::spawn(device, config, secrets);

    let mut states = session.subscribe();
    let watcher = tokio::spawn({
        let session = session.clone();
        async move {
            loop {
                let state = states.borrow().clone();
                match state {
                    PairingState::AwaitingPrompt => {
                        println!("accept the pairing prompt on the TV...");
                    }
                    PairingState::AwaitingPin => {
                        print!("enter the PIN shown on the TV: ");
                        let _ = std::io::stdout().flush();
                        let mut line = String::new();
                        if std::io::stdin().read_line(&mut line).is_ok() {
                            session.set_pin(line.trim());
                        }
                    }
                    _ => {}
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        }
    });

    let kind = if pin {
        PairingKind::Pin
    } else {
        PairingKind::Prompt
    };
    let outcome = session.ensure_ready(Some(kind)).await;
    watcher.abort();

    match &outcome {
        Ok(()) => println!("paired with {}", ip),
        Err(err) => println!("pairing failed: {}", err),
    }
    outcome
}

fn manual_device(ip: &str, kind: &str) -> DeviceRecord {
    let kind = match kind {
        "roku" => DeviceKind::Roku,
        "chromecast" => DeviceKind::Chromecast,
        "lg_webos" => DeviceKind::LgWebOs,
        "samsung_tizen" => DeviceKind::SamsungTizen,
        "sony_bravia" => DeviceKind::SonyBravia,
        "dlna_generic" => DeviceKind::DlnaGeneric,
        _ => DeviceKind::Unknown,
    };
    DeviceRecord::new(format!("{} ({})", kind, ip), ip, None, kind, HashMap::new())
}

fn parse_command(input: &str) -> Result<RemoteCommand, RemoteError> {
    if let Some(digit) = input.strip_prefix("digit:") {
        let n: u8 = digit.parse().map_err(|_| RemoteError::Unsupported)?;
        return Ok(RemoteCommand::Digit(n));
    }
    let command = match input {
        "power" => RemoteCommand::Power,
        "home" => RemoteCommand::Home,
        "back" => RemoteCommand::Back,
        "ok" => RemoteCommand::Ok,
        "up" => RemoteCommand::Up,
        "down" => RemoteCommand::Down,
        "left" => RemoteCommand::Left,
        "right" => RemoteCommand::Right,
        "menu" => RemoteCommand::Menu,
        "volume_up" => RemoteCommand::VolumeUp,
        "volume_down" => RemoteCommand::VolumeDown,
        "mute" => RemoteCommand::Mute,
        "play_pause" => RemoteCommand::PlayPause,
        "play" => RemoteCommand::Play,
        "pause" => RemoteCommand::Pause,
        "fast_forward" => RemoteCommand::FastForward,
        "rewind" => RemoteCommand::Rewind,
        "channel_up" => RemoteCommand::ChannelUp,
        "channel_down" => RemoteCommand::ChannelDown,
        "settings" => RemoteCommand::Settings,
        "input" => RemoteCommand::Input,
        "list" => RemoteCommand::List,
        "ad_sap" => RemoteCommand::AdSap,
        _ => return Err(RemoteError::Unsupported),
    };
    Ok(command)
}
