//! Long-lived pairing session with a webOS TV. One task owns the WebSocket
//! and every state transition; callers interact through a command channel and
//! observe state over a watch channel.
//!
//! Connect policy: secure transport first, one insecure fallback if the
//! secure attempt fails before the handshake, then error. The client key the
//! TV issues on registration is persisted keyed by device address before
//! readiness is signaled, so a crash between the two cannot lose it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::driver::lg::protocol::{
    self, REGISTER_ID, SsapMessage, SsapRequest, button_frame, register_frame, request_frame,
};
use crate::error::RemoteError;
use crate::model::{DeviceRecord, PairingKind, PairingState};
use crate::store::SecretStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POINTER_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

fn credential_key(ip_address: &str) -> String {
    format!("lgwebos.client_key.{}", ip_address)
}

/// Ports of the pairing transport. Overridable so tests can stand in for a
/// TV on loopback.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionPorts {
    pub secure: u16,
    pub insecure: u16,
}

impl Default for SessionPorts {
    fn default() -> Self {
        Self {
            secure: protocol::SECURE_PORT,
            insecure: protocol::INSECURE_PORT,
        }
    }
}

/// Surface the app resolver needs from a session; kept narrow so tests can
/// fake it.
#[async_trait]
pub trait SsapClient: Send + Sync {
    fn state(&self) -> PairingState;
    fn device_identifier(&self) -> String;
    async fn request(&self, request: SsapRequest) -> Result<SsapMessage, RemoteError>;
}

/// Handle to the session task. Cheap to clone; all clones address the same
/// connection.
#[derive(Clone)]
pub struct LgSession {
    device: DeviceRecord,
    secrets: SecretStore,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    state_rx: watch::Receiver<PairingState>,
    device_id: Arc<Mutex<Option<String>>>,
    request_timeout: Duration,
}

impl LgSession {
    pub fn spawn(device: DeviceRecord, config: &RemoteConfig, secrets: SecretStore) -> Self {
        Self::spawn_with_ports(device, config, secrets, SessionPorts::default())
    }

    pub(crate) fn spawn_with_ports(
        device: DeviceRecord,
        config: &RemoteConfig,
        secrets: SecretStore,
        ports: SessionPorts,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PairingState::Disconnected);
        let device_id = Arc::new(Mutex::new(None));

        let actor = SessionActor {
            device: device.clone(),
            secrets: secrets.clone(),
            ports,
            cmd_rx,
            state_tx,
            device_id: Arc::clone(&device_id),
            pairing: PairingKind::Prompt,
            waiters: Vec::new(),
            pending: HashMap::new(),
            registered: false,
        };
        tokio::spawn(actor.run());

        Self {
            device,
            secrets,
            cmd_tx,
            state_rx,
            device_id,
            request_timeout: config.request_timeout,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state_rx.borrow().clone()
    }

    /// Read-only state observation channel.
    pub fn subscribe(&self) -> watch::Receiver<PairingState> {
        self.state_rx.clone()
    }

    pub fn has_stored_credential(&self) -> bool {
        self.secrets
            .get(&credential_key(&self.device.ip_address))
            .ok()
            .flatten()
            .is_some()
    }

    /// Explicitly drop the persisted credential for this device.
    pub fn forget_credential(&self) -> Result<(), RemoteError> {
        self.secrets
            .delete(&credential_key(&self.device.ip_address))
    }

    /// Wait until the session is ready, driving a connect if none is under
    /// way. Concurrent callers share the single in-flight attempt and resolve
    /// with its outcome.
    pub async fn ensure_ready(&self, pairing: Option<PairingKind>) -> Result<(), RemoteError> {
        if self.state() == PairingState::Ready {
            return Ok(());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::EnsureReady {
                pairing,
                reply: reply_tx,
            })
            .map_err(|_| RemoteError::ConnectionFailed)?;
        reply_rx.await.map_err(|_| RemoteError::ConnectionFailed)?
    }

    /// Supply the PIN the TV is displaying.
    pub fn set_pin(&self, pin: &str) {
        if pin.is_empty() {
            return;
        }
        let _ = self.cmd_tx.send(SessionCommand::SetPin {
            pin: pin.to_string(),
        });
    }

    /// Press a physical key through the pointer input socket.
    pub async fn button(&self, name: &str) -> Result<(), RemoteError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Button {
                name: name.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| RemoteError::ConnectionFailed)?;
        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RemoteError::ConnectionFailed),
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    /// Disconnect and drop the pairing again, reconnecting in the requested
    /// mode.
    pub async fn restart_pairing(&self, pairing: PairingKind) -> Result<(), RemoteError> {
        self.disconnect();
        self.ensure_ready(Some(pairing)).await
    }

    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Disconnect);
    }
}

#[async_trait]
impl SsapClient for LgSession {
    fn state(&self) -> PairingState {
        LgSession::state(self)
    }

    /// Stable cache identity: the platform-reported device id when the TV
    /// supplied one, the network address otherwise.
    fn device_identifier(&self) -> String {
        let device_id = self.device_id.lock().unwrap_or_else(|e| e.into_inner());
        match device_id.as_deref() {
            Some(id) => format!("lgwebos.{}", id),
            None => format!("lgwebos.{}", self.device.ip_address),
        }
    }

    async fn request(&self, request: SsapRequest) -> Result<SsapMessage, RemoteError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Request {
                request,
                reply: reply_tx,
            })
            .map_err(|_| RemoteError::ConnectionFailed)?;
        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RemoteError::ConnectionFailed),
            Err(_) => Err(RemoteError::Timeout),
        }
    }
}

enum SessionCommand {
    EnsureReady {
        pairing: Option<PairingKind>,
        reply: oneshot::Sender<Result<(), RemoteError>>,
    },
    Request {
        request: SsapRequest,
        reply: oneshot::Sender<Result<SsapMessage, RemoteError>>,
    },
    Button {
        name: String,
        reply: oneshot::Sender<Result<(), RemoteError>>,
    },
    SetPin {
        pin: String,
    },
    Disconnect,
}

enum Pending {
    Caller(oneshot::Sender<Result<SsapMessage, RemoteError>>),
    SystemInfo,
    PointerSocket,
}

/// Why the drive loop ended; decides whether the actor keeps serving
/// commands.
enum Exit {
    TransportLost,
    Disconnected,
    ChannelClosed,
}

struct SessionActor {
    device: DeviceRecord,
    secrets: SecretStore,
    ports: SessionPorts,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    state_tx: watch::Sender<PairingState>,
    device_id: Arc<Mutex<Option<String>>>,
    pairing: PairingKind,
    waiters: Vec<oneshot::Sender<Result<(), RemoteError>>>,
    pending: HashMap<String, Pending>,
    registered: bool,
}

impl SessionActor {
    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                SessionCommand::EnsureReady { pairing, reply } => {
                    if let Some(pairing) = pairing {
                        self.pairing = pairing;
                    }
                    self.waiters.push(reply);
                    match self.establish().await {
                        Some(ws) => {
                            if matches!(self.drive(ws).await, Exit::ChannelClosed) {
                                return;
                            }
                        }
                        None => {} // establish already failed the waiters
                    }
                }
                SessionCommand::Request { reply, .. } => {
                    let _ = reply.send(Err(RemoteError::ConnectionFailed));
                }
                SessionCommand::Button { reply, .. } => {
                    let _ = reply.send(Err(RemoteError::ConnectionFailed));
                }
                SessionCommand::SetPin { .. } => {}
                SessionCommand::Disconnect => {
                    self.set_state(PairingState::Disconnected);
                }
            }
        }
    }

    fn set_state(&self, state: PairingState) {
        let _ = self.state_tx.send_replace(state);
    }

    /// Open the transport: secure port first, one insecure retry if the
    /// secure attempt fails before a connection exists, then error.
    async fn establish(&mut self) -> Option<WsStream> {
        self.set_state(PairingState::Connecting);
        self.registered = false;

        match self.open_transport(true).await {
            Ok(ws) => Some(ws),
            Err(first_err) => {
                warn!(
                    target: "uniremote::lgwebos",
                    device = %self.device.ip_address,
                    error = %first_err,
                    "secure transport failed, retrying insecure"
                );
                match self.open_transport(false).await {
                    Ok(ws) => Some(ws),
                    Err(second_err) => {
                        warn!(
                            target: "uniremote::lgwebos",
                            device = %self.device.ip_address,
                            error = %second_err,
                            "insecure transport failed"
                        );
                        self.set_state(PairingState::Error(second_err.to_string()));
                        self.drain_waiters(Err(RemoteError::ConnectionFailed));
                        None
                    }
                }
            }
        }
    }

    async fn open_transport(&self, secure: bool) -> Result<WsStream, RemoteError> {
        let (scheme, port) = if secure {
            ("wss", self.ports.secure)
        } else {
            ("ws", self.ports.insecure)
        };
        let ws_url = format!("{}://{}:{}", scheme, self.device.ip_address, port);
        info!(
            target: "uniremote::lgwebos",
            url = %ws_url,
            "connecting pairing transport"
        );

        let connector = if secure {
            Some(permissive_tls_connector()?)
        } else {
            None
        };

        let connect = connect_async_tls_with_config(ws_url, None, false, connector);
        match timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(err)) => Err(RemoteError::Network(err.to_string())),
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    /// Serve commands and inbound frames until the transport goes away.
    async fn drive(&mut self, mut ws: WsStream) -> Exit {
        let client_key = self.stored_client_key();
        let register = register_frame(self.pairing, client_key.as_deref());
        self.set_state(PairingState::Registering);
        if let Err(err) = ws.send(Message::Text(register)).await {
            return self.transport_lost(&mut None, err.to_string(), Vec::new());
        }

        let mut pointer: Option<WsStream> = None;
        let mut pointer_requested = false;
        let mut pending_buttons: Vec<(String, oneshot::Sender<Result<(), RemoteError>>)> =
            Vec::new();

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        let _ = ws.close(None).await;
                        return Exit::ChannelClosed;
                    };
                    match cmd {
                        SessionCommand::EnsureReady { pairing: _, reply } => {
                            if self.registered {
                                let _ = reply.send(Ok(()));
                            } else {
                                self.waiters.push(reply);
                            }
                        }
                        SessionCommand::Request { request, reply } => {
                            let id = Uuid::new_v4().to_string();
                            let frame = request_frame(&id, &request);
                            self.pending.insert(id, Pending::Caller(reply));
                            if let Err(err) = ws.send(Message::Text(frame)).await {
                                return self.transport_lost(&mut pointer, err.to_string(), pending_buttons);
                            }
                        }
                        SessionCommand::Button { name, reply } => {
                            if let Some(socket) = pointer.as_mut() {
                                match socket.send(Message::Text(button_frame(&name))).await {
                                    Ok(()) => {
                                        let _ = reply.send(Ok(()));
                                    }
                                    Err(err) => {
                                        // pointer socket died; next press reopens it
                                        pointer = None;
                                        pointer_requested = false;
                                        let _ = reply.send(Err(RemoteError::Network(err.to_string())));
                                    }
                                }
                            } else {
                                pending_buttons.push((name, reply));
                                if !pointer_requested {
                                    pointer_requested = true;
                                    let id = Uuid::new_v4().to_string();
                                    let frame = request_frame(
                                        &id,
                                        &SsapRequest::new(protocol::uri::POINTER_SOCKET),
                                    );
                                    self.pending.insert(id, Pending::PointerSocket);
                                    if let Err(err) = ws.send(Message::Text(frame)).await {
                                        return self.transport_lost(&mut pointer, err.to_string(), pending_buttons);
                                    }
                                }
                            }
                        }
                        SessionCommand::SetPin { pin } => {
                            self.set_state(PairingState::Registering);
                            let id = Uuid::new_v4().to_string();
                            let frame = request_frame(&id, &SsapRequest::set_pin(&pin));
                            if let Err(err) = ws.send(Message::Text(frame)).await {
                                return self.transport_lost(&mut pointer, err.to_string(), pending_buttons);
                            }
                        }
                        SessionCommand::Disconnect => {
                            let _ = ws.close(None).await;
                            if let Some(mut socket) = pointer.take() {
                                let _ = socket.close(None).await;
                            }
                            self.fail_pending(RemoteError::ConnectionFailed);
                            fail_buttons(pending_buttons, RemoteError::ConnectionFailed);
                            self.registered = false;
                            self.set_state(PairingState::Disconnected);
                            return Exit::Disconnected;
                        }
                    }
                }
                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match self
                                .handle_frame(&mut ws, &text, &mut pointer, &mut pending_buttons)
                                .await
                            {
                                Ok(()) => {}
                                Err(reason) => {
                                    return self.transport_lost(&mut pointer, reason, pending_buttons);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return self.transport_lost(
                                &mut pointer,
                                "connection closed".to_string(),
                                pending_buttons,
                            );
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            return self.transport_lost(&mut pointer, err.to_string(), pending_buttons);
                        }
                    }
                }
            }
        }
    }

    /// React to one inbound SSAP frame. Returns the failure reason when the
    /// frame proves the transport unusable.
    async fn handle_frame(
        &mut self,
        ws: &mut WsStream,
        text: &str,
        pointer: &mut Option<WsStream>,
        pending_buttons: &mut Vec<(String, oneshot::Sender<Result<(), RemoteError>>)>,
    ) -> Result<(), String> {
        let message = match SsapMessage::parse(text) {
            Ok(message) => message,
            Err(_) => {
                debug!(target: "uniremote::lgwebos", "unparseable frame ignored");
                return Ok(());
            }
        };

        if message.is_registered() {
            if let Some(key) = message.client_key() {
                // Persist before signaling readiness; a crash after this
                // write cannot lose the credential.
                if let Err(err) = self
                    .secrets
                    .set(&credential_key(&self.device.ip_address), key.as_bytes())
                {
                    warn!(
                        target: "uniremote::lgwebos",
                        error = %err,
                        "failed to persist client key"
                    );
                    self.set_state(PairingState::Error("credential save failed".to_string()));
                    self.drain_waiters(Err(err));
                    return Ok(());
                }
            }
            info!(
                target: "uniremote::lgwebos",
                device = %self.device.ip_address,
                "registered with tv"
            );
            self.registered = true;
            self.set_state(PairingState::Ready);
            self.drain_waiters(Ok(()));

            // learn the TV's stable id for the app-cache identity
            let id = Uuid::new_v4().to_string();
            let frame = request_frame(&id, &SsapRequest::new(protocol::uri::SYSTEM_INFO));
            self.pending.insert(id, Pending::SystemInfo);
            if let Err(err) = ws.send(Message::Text(frame)).await {
                return Err(err.to_string());
            }
            return Ok(());
        }

        if message.is_error() {
            let detail = message
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            if let Some(id) = &message.id
                && let Some(pending) = self.pending.remove(id)
            {
                resolve_pending(pending, Err(RemoteError::Network(detail.clone())));
                if !self.registered && id == REGISTER_ID {
                    self.set_state(PairingState::Error(detail));
                    self.drain_waiters(Err(RemoteError::PairingRequired));
                }
                return Ok(());
            }
            if !self.registered {
                // registration rejected (denied prompt, wrong pin)
                self.set_state(PairingState::Error(detail));
                self.drain_waiters(Err(RemoteError::PairingRequired));
            }
            return Ok(());
        }

        // plain response frame
        if message.id.as_deref() == Some(REGISTER_ID) {
            match message.pairing_kind() {
                Some(PairingKind::Prompt) => self.set_state(PairingState::AwaitingPrompt),
                Some(PairingKind::Pin) => self.set_state(PairingState::AwaitingPin),
                None => {}
            }
            return Ok(());
        }

        if let Some(device_id) = message.device_id() {
            let mut slot = self.device_id.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(device_id.to_string());
        }

        if let Some(id) = &message.id
            && let Some(pending) = self.pending.remove(id)
        {
            match pending {
                Pending::Caller(reply) => {
                    let _ = reply.send(Ok(message));
                }
                Pending::SystemInfo => {
                    // deviceId already captured above
                }
                Pending::PointerSocket => {
                    self.open_pointer_socket(&message, pointer, pending_buttons)
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn open_pointer_socket(
        &mut self,
        message: &SsapMessage,
        pointer: &mut Option<WsStream>,
        pending_buttons: &mut Vec<(String, oneshot::Sender<Result<(), RemoteError>>)>,
    ) {
        let Some(socket_path) = message.socket_path() else {
            fail_buttons(
                std::mem::take(pending_buttons),
                RemoteError::InvalidResponse,
            );
            return;
        };

        let connector = if socket_path.starts_with("wss") {
            match permissive_tls_connector() {
                Ok(connector) => Some(connector),
                Err(err) => {
                    fail_buttons(std::mem::take(pending_buttons), err);
                    return;
                }
            }
        } else {
            None
        };

        let connect = connect_async_tls_with_config(socket_path.to_string(), None, false, connector);
        match timeout(POINTER_CONNECT_TIMEOUT, connect).await {
            Ok(Ok((mut socket, _response))) => {
                let mut failed = false;
                for (name, reply) in pending_buttons.drain(..) {
                    if failed {
                        let _ = reply.send(Err(RemoteError::ConnectionFailed));
                        continue;
                    }
                    match socket.send(Message::Text(button_frame(&name))).await {
                        Ok(()) => {
                            let _ = reply.send(Ok(()));
                        }
                        Err(err) => {
                            failed = true;
                            let _ = reply.send(Err(RemoteError::Network(err.to_string())));
                        }
                    }
                }
                if !failed {
                    *pointer = Some(socket);
                }
            }
            Ok(Err(err)) => {
                fail_buttons(
                    std::mem::take(pending_buttons),
                    RemoteError::Network(err.to_string()),
                );
            }
            Err(_) => {
                fail_buttons(std::mem::take(pending_buttons), RemoteError::Timeout);
            }
        }
    }

    /// A hard transport failure cannot be attributed to one request, so every
    /// outstanding waiter fails together.
    fn transport_lost(
        &mut self,
        pointer: &mut Option<WsStream>,
        reason: String,
        pending_buttons: Vec<(String, oneshot::Sender<Result<(), RemoteError>>)>,
    ) -> Exit {
        warn!(
            target: "uniremote::lgwebos",
            device = %self.device.ip_address,
            reason = %reason,
            "pairing transport lost"
        );
        *pointer = None;
        self.fail_pending(RemoteError::ConnectionFailed);
        fail_buttons(pending_buttons, RemoteError::ConnectionFailed);

        if self.registered {
            self.set_state(PairingState::Disconnected);
        } else {
            self.set_state(PairingState::Error(reason));
            self.drain_waiters(Err(RemoteError::ConnectionFailed));
        }
        self.registered = false;
        Exit::TransportLost
    }

    fn fail_pending(&mut self, err: RemoteError) {
        for (_, pending) in self.pending.drain() {
            resolve_pending(pending, Err(err.clone()));
        }
    }

    fn drain_waiters(&mut self, outcome: Result<(), RemoteError>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn stored_client_key(&self) -> Option<String> {
        let bytes = self
            .secrets
            .get(&credential_key(&self.device.ip_address))
            .ok()
            .flatten()?;
        String::from_utf8(bytes).ok()
    }
}

fn resolve_pending(pending: Pending, outcome: Result<SsapMessage, RemoteError>) {
    if let Pending::Caller(reply) = pending {
        let _ = reply.send(outcome);
    }
}

fn fail_buttons(
    buttons: Vec<(String, oneshot::Sender<Result<(), RemoteError>>)>,
    err: RemoteError,
) {
    for (_, reply) in buttons {
        let _ = reply.send(Err(err.clone()));
    }
}

fn permissive_tls_connector() -> Result<Connector, RemoteError> {
    // webOS TVs present self-signed certificates; the pairing credential, not
    // the certificate chain, authenticates the peer.
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|err| RemoteError::Network(err.to_string()))?;
    Ok(Connector::NativeTls(tls))
}
