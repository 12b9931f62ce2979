//! Session state machine.
//!
//! One task per started session drives the connection:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Identified
//!                    ^                |           |
//!                    +-- Reconnecting <-----------+   (auto-reconnect only)
//! ```
//!
//! The task is the only writer to the socket. Callers hand it encoded frames through
//! the per-connection outbound channel, and it reads inbound frames in delivery
//! order: hello is answered with identify, identified resolves the readiness
//! signal, events go to the dispatcher and responses to the correlator.

use std::{fmt, sync::Arc};

use obsws_lib::{
    auth::{self, Secret},
    protocol::{
        Hello, Identified, Identify, Message, OpCode, ProtocolError, RequestId, decode_message,
        encode_message,
    },
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::{sync::mpsc, sync::oneshot, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ClientConfig, Endpoint},
    correlator::Correlator,
    error::ClientError,
    events::EventDispatcher,
    readiness::{Readiness, ReadinessSignal},
    transport::{FrameWriter, Inbound, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Socket open, handshake not finished.
    Connected,
    Identified,
    /// Waiting out the delay before the next attempt.
    Reconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Identified => "identified",
            SessionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Outcome of the first connection attempt of a session.
pub(crate) type OpenedTx = oneshot::Sender<Result<(), ClientError>>;

pub(crate) struct SessionTask {
    pub(crate) cancel: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

pub(crate) struct Core {
    pub(crate) config: ClientConfig,
    pub(crate) state: SessionState,
    pub(crate) readiness: ReadinessSignal,
    pub(crate) outbound: Option<mpsc::UnboundedSender<String>>,
    pub(crate) negotiated_rpc_version: Option<u32>,
    pub(crate) task: Option<SessionTask>,
}

impl Core {
    /// Replaces the readiness signal; anyone waiting on the old one follows along.
    pub(crate) fn renew_readiness(&mut self) {
        self.readiness.settle(Readiness::Superseded);
        self.readiness = ReadinessSignal::new();
    }
}

/// State shared between the client handle and the session task.
pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
    pub(crate) correlator: Correlator,
    pub(crate) events: EventDispatcher,
}

enum ConnectionEnd {
    Cancelled,
    Closed(String),
}

impl Shared {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            core: Mutex::new(Core {
                config,
                state: SessionState::Disconnected,
                readiness: ReadinessSignal::new(),
                outbound: None,
                negotiated_rpc_version: None,
                task: None,
            }),
            correlator: Correlator::default(),
            events: EventDispatcher::default(),
        }
    }

    /// Starts the session task if an endpoint is configured and none is running.
    ///
    /// The returned receiver reports whether the first attempt opened a socket.
    pub(crate) fn start(self: &Arc<Self>) -> Option<oneshot::Receiver<Result<(), ClientError>>> {
        let mut core = self.core.lock();
        self.spawn_session(&mut core)
    }

    /// Points an idle session at `endpoint` and starts it, under one lock so no
    /// caller sees the endpoint without a task.
    pub(crate) fn start_at(
        self: &Arc<Self>,
        endpoint: Endpoint,
        password: Option<Secret>,
    ) -> Option<oneshot::Receiver<Result<(), ClientError>>> {
        let mut core = self.core.lock();
        if core.task.is_some() {
            return None;
        }
        core.config.endpoint = Some(endpoint);
        core.config.password = password;
        self.spawn_session(&mut core)
    }

    fn spawn_session(
        self: &Arc<Self>,
        core: &mut Core,
    ) -> Option<oneshot::Receiver<Result<(), ClientError>>> {
        core.config.endpoint.as_ref()?;
        if core.task.is_some() {
            return None;
        }

        let cancel = CancellationToken::new();
        let (opened_tx, opened_rx) = oneshot::channel();
        let handle = tokio::spawn(run_session(Arc::clone(self), cancel.clone(), opened_tx));
        core.task = Some(SessionTask { cancel, handle });
        Some(opened_rx)
    }

    pub(crate) fn outbound(&self) -> Result<mpsc::UnboundedSender<String>, ClientError> {
        self.core
            .lock()
            .outbound
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    fn begin_attempt(&self) -> Option<(Endpoint, ClientConfig)> {
        let mut core = self.core.lock();
        let endpoint = core.config.endpoint.clone()?;
        core.state = SessionState::Connecting;
        core.renew_readiness();
        Some((endpoint, core.config.clone()))
    }

    fn on_open(&self, outbound: mpsc::UnboundedSender<String>) {
        let mut core = self.core.lock();
        core.state = SessionState::Connected;
        core.outbound = Some(outbound);
    }

    fn on_disconnect(&self, reason: &str) {
        {
            let mut core = self.core.lock();
            core.state = SessionState::Disconnected;
            core.outbound = None;
            core.negotiated_rpc_version = None;
            core.renew_readiness();
        }
        let failed = self
            .correlator
            .fail_all(|| ClientError::ConnectionClosed(reason.to_owned()));
        if failed > 0 {
            warn!("failed {} in-flight requests: {}", failed, reason);
        }
    }

    fn on_identified(&self, identified: Identified) {
        let mut core = self.core.lock();
        let first = core.state != SessionState::Identified;
        core.state = SessionState::Identified;
        core.negotiated_rpc_version = Some(identified.negotiated_rpc_version);
        core.readiness.resolve();
        if first {
            info!(
                "identified with server (rpc version {})",
                identified.negotiated_rpc_version
            );
        } else {
            debug!("re-identified with server");
        }
    }

    fn identify_for(&self, hello: &Hello) -> Identify {
        let (password, subscriptions) = {
            let core = self.core.lock();
            (core.config.password.clone(), core.config.event_subscriptions)
        };
        let identify = Identify::new(hello.rpc_version, subscriptions);
        let Some(password) = password else {
            return identify;
        };

        match auth::respond(&password, hello.authentication.as_ref()) {
            Ok(proof) => identify.with_authentication(proof),
            Err(err) => {
                warn!("identifying without authentication: {}", err);
                identify
            }
        }
    }

    /// A response frame that names a request id settles that request even when its
    /// payload does not decode. Anything else is dropped.
    fn reject_undecodable(&self, text: &str, err: ProtocolError) {
        let Some(request_id) = response_id(text) else {
            debug!("ignoring inbound frame: {}", err);
            return;
        };
        warn!("undecodable response for request {}: {}", request_id, err);
        self.correlator.fail(&request_id, ClientError::Protocol(err));
    }

    /// Routes one inbound text frame; returns a frame to send back, if any.
    fn handle_frame(&self, text: &str) -> Option<String> {
        let message = match decode_message(text) {
            Ok(message) => message,
            Err(err) => {
                self.reject_undecodable(text, err);
                return None;
            }
        };

        match message {
            Message::Hello(hello) => {
                debug!(
                    "hello from server (websocket {}, rpc version {}, auth required: {})",
                    hello.obs_web_socket_version,
                    hello.rpc_version,
                    hello.requires_auth()
                );
                let identify = Message::Identify(self.identify_for(&hello));
                match encode_message(&identify) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        error!("could not encode identify: {}", err);
                        None
                    }
                }
            }
            Message::Identified(identified) => {
                self.on_identified(identified);
                None
            }
            Message::Event(event) => {
                self.events.dispatch(&event);
                None
            }
            Message::RequestResponse(response) => {
                self.correlator.complete_request(response);
                None
            }
            Message::RequestBatchResponse(response) => {
                self.correlator.complete_batch(response);
                None
            }
            other => {
                debug!("ignoring unexpected {} frame", other.op());
                None
            }
        }
    }
}

fn response_id(text: &str) -> Option<RequestId> {
    let frame: Value = serde_json::from_str(text).ok()?;
    let op = u8::try_from(frame["op"].as_u64()?).ok()?;
    match OpCode::try_from(op).ok()? {
        OpCode::RequestResponse | OpCode::RequestBatchResponse => {
            frame["d"]["requestId"].as_str().map(RequestId::from)
        }
        _ => None,
    }
}

async fn run_session(shared: Arc<Shared>, cancel: CancellationToken, opened: OpenedTx) {
    let mut opened = Some(opened);

    loop {
        let Some((endpoint, config)) = shared.begin_attempt() else {
            return;
        };

        let attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            attempt = Transport::connect(&endpoint) => attempt,
        };

        let reason = match attempt {
            Ok(transport) => {
                info!("connected to {}", endpoint);
                if let Some(opened) = opened.take() {
                    let _ = opened.send(Ok(()));
                }
                match run_connection(&shared, transport, &cancel).await {
                    ConnectionEnd::Cancelled => return,
                    ConnectionEnd::Closed(reason) => reason,
                }
            }
            Err(err) => {
                error!("connecting to {} failed: {}", endpoint, err);
                err.to_string()
            }
        };

        info!("disconnected from {}: {}", endpoint, reason);
        shared.on_disconnect(&reason);

        if !config.auto_reconnect {
            shared
                .core
                .lock()
                .readiness
                .settle(Readiness::Failed(reason.clone()));
            if let Some(opened) = opened.take() {
                let _ = opened.send(Err(ClientError::ConnectionFailed {
                    endpoint: endpoint.to_string(),
                    reason,
                }));
            }
            return;
        }

        shared.core.lock().state = SessionState::Reconnecting;
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(config.reconnect_delay) => {}
        }
        info!("reconnecting to {}", endpoint);
    }
}

async fn run_connection(
    shared: &Shared,
    transport: Transport,
    cancel: &CancellationToken,
) -> ConnectionEnd {
    let (mut writer, mut reader) = transport.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    shared.on_open(outbound_tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                writer.close("client closed").await;
                return ConnectionEnd::Cancelled;
            }
            Some(text) = outbound_rx.recv() => {
                if let Err(err) = writer.send_text(text).await {
                    return ConnectionEnd::Closed(err.to_string());
                }
            }
            inbound = reader.recv() => match inbound {
                Inbound::Text(text) => {
                    if let Some(reply) = shared.handle_frame(&text) {
                        send_or_log(&mut writer, reply).await;
                    }
                }
                Inbound::Closed(reason) => return ConnectionEnd::Closed(reason),
            }
        }
    }
}

/// Handshake frames are best effort: a failed write shows up as a close on the
/// reader side, which drives the reconnect logic.
async fn send_or_log(writer: &mut FrameWriter, text: String) {
    if let Err(err) = writer.send_text(text).await {
        error!("websocket is not open, cannot send message: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use obsws_lib::protocol::RequestId;

    use super::response_id;

    #[test]
    fn response_id_only_reads_response_frames() {
        assert_eq!(
            response_id(r#"{"op":7,"d":{"requestId":"r-1","requestStatus":{"code":70000}}}"#),
            Some(RequestId::from("r-1"))
        );
        assert_eq!(
            response_id(r#"{"op":9,"d":{"requestId":"b-1","results":"nope"}}"#),
            Some(RequestId::from("b-1"))
        );
        assert_eq!(response_id(r#"{"op":5,"d":{"requestId":"r-1"}}"#), None);
        assert_eq!(response_id(r#"{"op":7,"d":{}}"#), None);
        assert_eq!(response_id("not json"), None);
    }
}
