use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use obsws_lib::{auth::Secret, constants::RPC_VERSION, protocol::Event};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// When set, clients must prove knowledge of it during identify.
    pub password: Option<Secret>,
    pub rpc_version: u32,
    pub obs_studio_version: String,
    pub obs_web_socket_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            password: None,
            rpc_version: RPC_VERSION,
            obs_studio_version: "30.0.0".into(),
            obs_web_socket_version: "5.5.0".into(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Shared by the accept loop and every connection. Cloning is cheap.
#[derive(Clone)]
pub struct ServerState {
    config: Arc<ServerConfig>,
    events: broadcast::Sender<Event>,
    kick: broadcast::Sender<()>,
    sessions: Arc<AtomicU64>,
    identified: Arc<AtomicU64>,
    live: Arc<AtomicUsize>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (kick, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            events,
            kick,
            sessions: Arc::new(AtomicU64::new(1)),
            identified: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Sends `event` to every identified client subscribed to its intent.
    pub fn emit(&self, event: Event) -> usize {
        debug!("broadcasting {}", event.event_type);
        self.events.send(event).unwrap_or(0)
    }

    /// Drops every live connection, as if the server went away.
    pub fn disconnect_all(&self) -> usize {
        self.kick.send(()).unwrap_or(0)
    }

    /// Number of handshakes completed since the server started.
    pub fn identified_sessions(&self) -> u64 {
        self.identified.load(Ordering::Relaxed)
    }

    /// Number of currently identified connections.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.sessions.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub(crate) fn subscribe_kick(&self) -> broadcast::Receiver<()> {
        self.kick.subscribe()
    }

    pub(crate) fn session_identified(&self) -> LiveSession {
        self.identified.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
        LiveSession {
            live: Arc::clone(&self.live),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Keeps the live-session count accurate however a connection ends.
pub(crate) struct LiveSession {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}
