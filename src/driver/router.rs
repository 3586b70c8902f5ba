//! Command router. Wraps a driver, flags capability mismatches, measures
//! latency for every dispatch, and propagates driver errors unchanged after
//! logging them with the originating device address.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::RemoteConfig;
use crate::driver::TvDriver;
use crate::error::RemoteError;
use crate::model::{Capability, MediaKind, RemoteCommand, StreamingApp};

pub struct CommandRouter {
    driver: Box<dyn TvDriver>,
    config: RemoteConfig,
}

impl CommandRouter {
    pub fn new(driver: Box<dyn TvDriver>, config: RemoteConfig) -> Self {
        Self { driver, config }
    }

    pub fn driver(&self) -> &dyn TvDriver {
        self.driver.as_ref()
    }

    pub async fn send(&self, command: RemoteCommand) -> Result<(), RemoteError> {
        if let Some(required) = command.required_capability() {
            self.check_capability(required, &format!("command {}", command));
        }
        self.dispatch(&format!("command {}", command), self.driver.send(command))
            .await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), RemoteError> {
        self.check_capability(Capability::TextInput, "send_text");
        let label = format!("send_text ({} chars)", text.chars().count());
        self.dispatch(&label, self.driver.send_text(text)).await
    }

    pub async fn launch(&self, app: StreamingApp) -> Result<(), RemoteError> {
        self.check_capability(Capability::Launcher, "launch");
        self.dispatch(&format!("launch {}", app), self.driver.launch(app))
            .await
    }

    pub async fn cast_media(
        &self,
        media_url: &url::Url,
        kind: MediaKind,
    ) -> Result<(), RemoteError> {
        self.check_capability(Capability::Casting, "cast_media");
        self.dispatch(
            &format!("cast_media {:?}", kind),
            self.driver.cast_media(media_url, kind),
        )
        .await
    }

    /// Observability only: a missing capability is logged, never blocked,
    /// since some commands work despite an incomplete declaration.
    fn check_capability(&self, required: Capability, operation: &str) {
        if !self.driver.capabilities().contains(&required) {
            warn!(
                target: "uniremote::router",
                device = %self.driver.device().ip_address,
                capability = ?required,
                operation,
                "capability not declared by driver, attempting anyway"
            );
        }
    }

    async fn dispatch(
        &self,
        label: &str,
        operation: impl std::future::Future<Output = Result<(), RemoteError>>,
    ) -> Result<(), RemoteError> {
        let start = Instant::now();
        if self.config.verbose {
            debug!(
                target: "uniremote::router",
                operation = label,
                started_at = %chrono::Utc::now().to_rfc3339(),
                "dispatch started"
            );
        }

        let result = operation.await;
        let latency_ms = start.elapsed().as_millis();

        match &result {
            Ok(()) => {
                info!(
                    target: "uniremote::router",
                    device = %self.driver.device().ip_address,
                    operation = label,
                    latency_ms,
                    "dispatch ok"
                );
                if self.config.verbose {
                    debug!(
                        target: "uniremote::router",
                        operation = label,
                        finished_at = %chrono::Utc::now().to_rfc3339(),
                        "dispatch finished"
                    );
                }
            }
            Err(err) => {
                error!(
                    target: "uniremote::router",
                    device = %self.driver.device().ip_address,
                    operation = label,
                    latency_ms,
                    error = %err,
                    "dispatch failed"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceKind, DeviceRecord};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    struct RecordingDriver {
        device: DeviceRecord,
        capabilities: HashSet<Capability>,
        sent: Mutex<Vec<RemoteCommand>>,
        fail_with: Option<RemoteError>,
    }

    impl RecordingDriver {
        fn new(capabilities: &[Capability], fail_with: Option<RemoteError>) -> Self {
            Self {
                device: DeviceRecord::new(
                    "fake",
                    "192.168.1.77",
                    None,
                    DeviceKind::Roku,
                    HashMap::new(),
                ),
                capabilities: capabilities.iter().copied().collect(),
                sent: Mutex::new(Vec::new()),
                fail_with,
            }
        }
    }

    #[async_trait]
    impl TvDriver for RecordingDriver {
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

        async fn send(&self, command: RemoteCommand) -> Result<(), RemoteError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.sent.lock().unwrap().push(command);
            Ok(())
        }

        async fn send_text(&self, _text: &str) -> Result<(), RemoteError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(())
        }

        async fn launch(&self, _app: StreamingApp) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn cast_media(
            &self,
            _media_url: &url::Url,
            _kind: MediaKind,
        ) -> Result<(), RemoteError> {
            Err(RemoteError::Unsupported)
        }
    }

    #[tokio::test]
    async fn test_missing_capability_does_not_block_dispatch() {
        let driver = RecordingDriver::new(&[], None);
        let router = CommandRouter::new(Box::new(driver), RemoteConfig::default());
        assert!(router.send(RemoteCommand::VolumeUp).await.is_ok());
    }

    #[tokio::test]
    async fn test_driver_error_propagates_unchanged() {
        let driver = RecordingDriver::new(
            &[Capability::Navigation],
            Some(RemoteError::Network("unreachable".to_string())),
        );
        let router = CommandRouter::new(Box::new(driver), RemoteConfig::default());
        assert_eq!(
            router.send(RemoteCommand::Ok).await,
            Err(RemoteError::Network("unreachable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unsupported_cast_surfaces() {
        let driver = RecordingDriver::new(&[Capability::Casting], None);
        let router = CommandRouter::new(Box::new(driver), RemoteConfig::default());
        let media_url = url::Url::parse("http://example.local/video.mp4").unwrap();
        assert_eq!(
            router.cast_media(&media_url, MediaKind::Video).await,
            Err(RemoteError::Unsupported)
        );
    }
}
