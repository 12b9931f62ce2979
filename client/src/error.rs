use obsws_lib::protocol::{ProtocolError, RequestId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket is not open, cannot send request")]
    NotConnected,
    #[error("could not connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
    #[error("connection closed before a response arrived: {0}")]
    ConnectionClosed(String),
    #[error("client closed")]
    Closed,
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        request_id: RequestId,
        timeout_ms: u64,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn connection_failed_names_endpoint() {
        let err = ClientError::ConnectionFailed {
            endpoint: "localhost:4455".into(),
            reason: "refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not connect to localhost:4455: refused"
        );
    }
}
