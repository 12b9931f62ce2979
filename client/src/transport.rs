//! WebSocket transport.
//!
//! Connects to an endpoint and moves text frames. Knows nothing about op codes,
//! authentication or reconnection.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, error};

use crate::{config::Endpoint, error::ClientError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the reader observed on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    Text(String),
    Closed(String),
}

pub(crate) struct Transport {
    ws: WsStream,
}

impl Transport {
    pub(crate) async fn connect(endpoint: &Endpoint) -> Result<Self, ClientError> {
        let url = endpoint.url();
        debug!("opening websocket to {}", url);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self { ws })
    }

    /// Splits into halves so reads and writes can be awaited side by side.
    pub(crate) fn split(self) -> (FrameWriter, FrameReader) {
        let (sink, stream) = self.ws.split();
        (FrameWriter { sink }, FrameReader { stream })
    }
}

pub(crate) struct FrameWriter {
    sink: SplitSink<WsStream, Message>,
}

impl FrameWriter {
    pub(crate) async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))
    }

    pub(crate) async fn close(&mut self, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        };
        if let Err(err) = self.sink.send(Message::Close(Some(frame))).await {
            debug!("close frame not delivered: {}", err);
        }
        let _ = self.sink.close().await;
    }
}

pub(crate) struct FrameReader {
    stream: SplitStream<WsStream>,
}

impl FrameReader {
    /// Waits for the next text frame. Ping/pong is answered by tungstenite and
    /// binary frames are not part of the protocol, so both are skipped.
    pub(crate) async fn recv(&mut self) -> Inbound {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    debug!("ignoring {} byte binary frame", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
                        None => "closed by peer".to_owned(),
                    };
                    return Inbound::Closed(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    error!("websocket error: {}", err);
                    return Inbound::Closed(err.to_string());
                }
                None => return Inbound::Closed("stream ended".to_owned()),
            }
        }
    }
}
