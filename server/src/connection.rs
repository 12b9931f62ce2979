use std::net::SocketAddr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use obsws_lib::{
    auth::{self, AuthChallenge},
    protocol::{
        Event, EventSubscription, Hello, Identified, Identify, Message, decode_message, encode_message,
    },
};
use tokio::{
    net::TcpStream,
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
};
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::{
        self,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};

use crate::{error::ServerError, handlers, state::ServerState};

type WsSink = SplitSink<WebSocketStream<TcpStream>, tungstenite::Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Close codes a client can act on.
pub mod close_code {
    pub const NOT_IDENTIFIED: u16 = 4007;
    pub const AUTHENTICATION_FAILED: u16 = 4009;
    pub const UNSUPPORTED_RPC_VERSION: u16 = 4010;
    pub const GOING_AWAY: u16 = 1001;
}

pub(crate) async fn handle_connection(
    stream: TcpStream,
    state: ServerState,
) -> Result<(), ServerError> {
    let peer = stream.peer_addr()?;
    let (mut sink, mut stream) = accept_async(stream).await?.split();
    let session_id = state.next_session_id();

    let challenge = state.config().password.as_ref().map(|_| AuthChallenge {
        challenge: random_token(),
        salt: random_token(),
    });
    let hello = Hello {
        obs_studio_version: state.config().obs_studio_version.clone(),
        obs_web_socket_version: state.config().obs_web_socket_version.clone(),
        rpc_version: state.config().rpc_version,
        authentication: challenge.clone(),
    };
    send(&mut sink, &Message::Hello(hello)).await?;

    let identify = match read_message(&mut stream).await? {
        Some(Message::Identify(identify)) => identify,
        Some(other) => {
            warn!("{} sent {} before identifying", peer, other.op());
            return close(&mut sink, close_code::NOT_IDENTIFIED, "Not identified.").await;
        }
        None => {
            debug!("{} left before identifying", peer);
            return Ok(());
        }
    };

    if let Err((code, reason)) = check_identify(&state, challenge.as_ref(), &identify) {
        warn!("rejected identify from {}: {}", peer, reason);
        return close(&mut sink, code, reason).await;
    }

    // Registered before the client learns it is identified, so nothing it
    // triggers afterwards can slip past this connection.
    let _live = state.session_identified();
    let events = state.subscribe_events();
    let kick = state.subscribe_kick();

    let negotiated_rpc_version = identify.rpc_version;
    send(
        &mut sink,
        &Message::Identified(Identified {
            negotiated_rpc_version,
        }),
    )
    .await?;
    info!(
        "client identified: {} (session_id={}, rpc_version={})",
        peer, session_id, negotiated_rpc_version
    );

    let subscriptions = identify
        .event_subscriptions
        .unwrap_or(EventSubscription::ALL);
    let context = SessionContext {
        events,
        kick,
        negotiated_rpc_version,
    };
    let result = serve(&state, peer, &mut sink, &mut stream, context, subscriptions).await;
    info!("client disconnected: {} (session_id={})", peer, session_id);
    result
}

fn check_identify(
    state: &ServerState,
    challenge: Option<&AuthChallenge>,
    identify: &Identify,
) -> Result<(), (u16, &'static str)> {
    if identify.rpc_version == 0 || identify.rpc_version > state.config().rpc_version {
        return Err((
            close_code::UNSUPPORTED_RPC_VERSION,
            "Your requested RPC version is not supported by this server.",
        ));
    }

    if let (Some(password), Some(challenge)) = (&state.config().password, challenge) {
        let verified = identify
            .authentication
            .as_deref()
            .is_some_and(|proof| auth::verify(password, challenge, proof));
        if !verified {
            return Err((close_code::AUTHENTICATION_FAILED, "Authentication failed."));
        }
    }

    Ok(())
}

struct SessionContext {
    events: broadcast::Receiver<Event>,
    kick: broadcast::Receiver<()>,
    negotiated_rpc_version: u32,
}

async fn serve(
    state: &ServerState,
    peer: SocketAddr,
    sink: &mut WsSink,
    stream: &mut WsStream,
    context: SessionContext,
    mut subscriptions: EventSubscription,
) -> Result<(), ServerError> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Message>();
    let SessionContext {
        mut events,
        mut kick,
        negotiated_rpc_version,
    } = context;

    loop {
        tokio::select! {
            _ = kick.recv() => {
                return close(sink, close_code::GOING_AWAY, "Server disconnected all clients.").await;
            }
            Some(reply) = reply_rx.recv() => send(sink, &reply).await?,
            event = events.recv() => match event {
                Ok(event) if subscriptions.intersects(event.event_intent) => {
                    send(sink, &Message::Event(event)).await?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} missed {} events", peer, skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            inbound = read_message(stream) => match inbound? {
                None => return Ok(()),
                Some(Message::Request(request)) => {
                    let state = state.clone();
                    let reply_tx = reply_tx.clone();
                    tokio::spawn(async move {
                        let response = handlers::respond(&state, request).await;
                        let _ = reply_tx.send(Message::RequestResponse(response));
                    });
                }
                Some(Message::RequestBatch(batch)) => {
                    let state = state.clone();
                    let reply_tx = reply_tx.clone();
                    tokio::spawn(async move {
                        let response = handlers::respond_batch(&state, batch).await;
                        let _ = reply_tx.send(Message::RequestBatchResponse(response));
                    });
                }
                Some(Message::Reidentify(reidentify)) => {
                    subscriptions = reidentify.event_subscriptions;
                    debug!("{} re-identified with subscriptions {:?}", peer, subscriptions);
                    send(sink, &Message::Identified(Identified {
                        negotiated_rpc_version,
                    })).await?;
                }
                Some(other) => debug!("ignoring {} from {}", other.op(), peer),
            },
        }
    }
}

/// Next protocol message from the client, or `None` once the socket closes.
/// Frames that do not decode are skipped.
async fn read_message(stream: &mut WsStream) -> Result<Option<Message>, ServerError> {
    loop {
        match stream.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => match decode_message(text.as_str()) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => debug!("skipping undecodable frame: {}", err),
            },
            Some(Ok(tungstenite::Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn send(sink: &mut WsSink, message: &Message) -> Result<(), ServerError> {
    let text = encode_message(message)?;
    sink.send(tungstenite::Message::Text(text.into())).await?;
    Ok(())
}

async fn close(sink: &mut WsSink, code: u16, reason: &str) -> Result<(), ServerError> {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    };
    sink.send(tungstenite::Message::Close(Some(frame))).await?;
    let _ = sink.close().await;
    Ok(())
}

fn random_token() -> String {
    STANDARD.encode(rand::random::<[u8; 32]>())
}
