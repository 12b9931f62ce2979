use std::{sync::Arc, time::Duration};

use obsws_lib::{
    auth::Secret,
    protocol::{
        BatchRequest, Event, EventSubscription, ExecutionType, Message, Reidentify, Request,
        RequestBatch, RequestBatchResponse, RequestId, RequestResponse, encode_message,
    },
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::{ClientConfig, Endpoint},
    correlator::Completion,
    error::ClientError,
    events::ListenerHandle,
    readiness::{Readiness, ReadinessSignal},
    session::{SessionState, Shared},
};

/// Handle to one session with an obs-websocket server.
///
/// Dropping the handle stops the session task; call [`ObsClient::close`] to also
/// wait for the socket to shut down.
pub struct ObsClient {
    shared: Arc<Shared>,
}

impl ObsClient {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
        }
    }

    /// Creates a client, connects it, and waits until the handshake completes.
    ///
    /// This is the only way to build a client. A config without an endpoint yields
    /// an idle client immediately; [`ObsClient::redirect`] can point it somewhere
    /// later. With
    /// auto-reconnect enabled an unreachable server is retried until it answers.
    ///
    /// # Errors
    ///
    /// With auto-reconnect disabled, returns [`ClientError::ConnectionFailed`] when
    /// the first connection cannot be opened or closes before identification.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Self::new(config);
        if let Some(opened) = client.shared.start() {
            opened.await.map_err(|_| ClientError::Closed)??;
        }
        client.wait_for_initialization().await?;
        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Connected | SessionState::Identified
        )
    }

    pub fn is_identified(&self) -> bool {
        self.state() == SessionState::Identified
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.shared.core.lock().config.endpoint.clone()
    }

    pub fn event_subscriptions(&self) -> EventSubscription {
        self.shared.core.lock().config.event_subscriptions
    }

    pub fn negotiated_rpc_version(&self) -> Option<u32> {
        self.shared.core.lock().negotiated_rpc_version
    }

    /// Waits until the current connection is identified.
    ///
    /// Returns at once for an identified or idle client. A reconnect while waiting
    /// does not end the wait; the next successful handshake does.
    ///
    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client is closed while waiting,
    /// [`ClientError::ConnectionFailed`] if the session gave up reconnecting, and
    /// [`ClientError::NotConnected`] if no session task is running for the endpoint.
    pub async fn wait_for_initialization(&self) -> Result<(), ClientError> {
        loop {
            let (waiter, endpoint) = {
                let core = self.shared.core.lock();
                let Some(endpoint) = core.config.endpoint.clone() else {
                    return Ok(());
                };
                if core.state == SessionState::Identified {
                    return Ok(());
                }
                if core.task.is_none() {
                    return Err(ClientError::NotConnected);
                }
                (core.readiness.subscribe(), endpoint)
            };

            match waiter.wait().await {
                Readiness::Identified => return Ok(()),
                Readiness::Pending | Readiness::Superseded => {}
                Readiness::Failed(reason) => {
                    return Err(ClientError::ConnectionFailed {
                        endpoint: endpoint.to_string(),
                        reason,
                    });
                }
                Readiness::Closed => return Err(ClientError::Closed),
            }
        }
    }

    /// Sends one request and waits for its response.
    ///
    /// A response whose status reports failure is still returned as `Ok`; inspect
    /// [`RequestResponse::request_status`].
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] when the socket is not open (nothing is sent),
    /// [`ClientError::ConnectionClosed`] or [`ClientError::Closed`] when the session
    /// ends first, and [`ClientError::Timeout`] when a request timeout is configured
    /// and expires.
    pub async fn send_request(
        &self,
        request_type: impl Into<String>,
        request_data: Option<Value>,
    ) -> Result<RequestResponse, ClientError> {
        let outbound = self.shared.outbound()?;
        let request_id = RequestId::generate();
        let request_type = request_type.into();
        let frame = encode_message(&Message::Request(Request {
            request_id: request_id.clone(),
            request_type: request_type.clone(),
            request_data,
        }))?;

        let completion = self.shared.correlator.register_request(request_id.clone());
        if outbound.send(frame).is_err() {
            self.shared.correlator.forget(&request_id);
            return Err(ClientError::NotConnected);
        }
        debug!("sent request {} ({})", request_type, request_id);
        self.await_completion(request_id, completion).await
    }

    /// Sends several requests as one batch and waits for all results.
    ///
    /// `halt_on_failure` and `execution_type` are interpreted by the server.
    ///
    /// # Errors
    ///
    /// Same as [`ObsClient::send_request`].
    pub async fn send_batch_request(
        &self,
        requests: Vec<BatchRequest>,
        halt_on_failure: bool,
        execution_type: ExecutionType,
    ) -> Result<RequestBatchResponse, ClientError> {
        let outbound = self.shared.outbound()?;
        let request_id = RequestId::generate();
        let count = requests.len();
        let frame = encode_message(&Message::RequestBatch(RequestBatch {
            request_id: request_id.clone(),
            requests,
            halt_on_failure: Some(halt_on_failure),
            execution_type: Some(execution_type),
        }))?;

        let completion = self.shared.correlator.register_batch(request_id.clone());
        if outbound.send(frame).is_err() {
            self.shared.correlator.forget(&request_id);
            return Err(ClientError::NotConnected);
        }
        debug!("sent batch {} with {} requests", request_id, count);
        self.await_completion(request_id, completion).await
    }

    async fn await_completion<T>(
        &self,
        request_id: RequestId,
        completion: Completion<T>,
    ) -> Result<T, ClientError> {
        let limit = self.shared.core.lock().config.request_timeout;
        let outcome = match limit {
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.shared.correlator.forget(&request_id);
                    return Err(ClientError::Timeout {
                        request_id,
                        timeout_ms: millis(limit),
                    });
                }
            },
            None => completion.await,
        };
        outcome.unwrap_or_else(|_| Err(ClientError::ConnectionClosed("response dropped".into())))
    }

    /// Changes the event subscriptions of the session.
    ///
    /// The mask is kept for every later identify. If the session is identified the
    /// server is told right away; otherwise the mask takes effect on the next
    /// handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the frame cannot be encoded.
    pub fn reidentify(&self, event_subscriptions: EventSubscription) -> Result<(), ClientError> {
        let outbound = {
            let mut core = self.shared.core.lock();
            core.config.event_subscriptions = event_subscriptions;
            if core.state != SessionState::Identified {
                return Ok(());
            }
            core.outbound.clone()
        };
        let Some(outbound) = outbound else {
            return Ok(());
        };

        let frame = encode_message(&Message::Reidentify(Reidentify {
            event_subscriptions,
        }))?;
        if outbound.send(frame).is_err() {
            warn!("websocket is not open, subscriptions apply on next identify");
        }
        Ok(())
    }

    /// Registers `callback` for events named `event_type`, or for every event when
    /// `None`. Callbacks run on the session task in frame order.
    pub fn add_event_listener<F>(&self, event_type: Option<&str>, callback: F) -> ListenerHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.events.add(event_type, callback)
    }

    /// Removes a listener. Unknown or already removed handles are ignored.
    pub fn remove_event_listener(&self, handle: ListenerHandle) -> bool {
        self.shared.events.remove(handle)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.events.len()
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.len()
    }

    /// Tears down the session and points the same handle at another server.
    ///
    /// Listeners and credentials of the old session are dropped, as with
    /// [`ObsClient::close`]. Returns once the new session task is started; use
    /// [`ObsClient::wait_for_initialization`] to wait for the handshake.
    pub async fn redirect(&self, host: impl Into<String>, port: u16, password: Option<Secret>) {
        self.close().await;
        let endpoint = Endpoint::new(host, port);
        info!("redirecting session to {}", endpoint);
        let _ = self.shared.start_at(endpoint, password);
    }

    /// Closes the connection, cancels any pending reconnect, and forgets the
    /// endpoint, credentials and listeners. Calling it again is a no-op.
    pub async fn close(&self) {
        let task = self.shared.core.lock().task.take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(err) = task.handle.await {
                warn!("session task ended abnormally: {}", err);
            }
            info!("session closed");
        }

        {
            let mut core = self.shared.core.lock();
            core.state = SessionState::Disconnected;
            core.outbound = None;
            core.negotiated_rpc_version = None;
            core.config.endpoint = None;
            core.config.password = None;
            core.readiness.settle(Readiness::Closed);
            core.readiness = ReadinessSignal::new();
        }
        self.shared.correlator.fail_all(|| ClientError::Closed);
        self.shared.events.clear();
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        if let Some(task) = self.shared.core.lock().task.take() {
            task.cancel.cancel();
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use obsws_lib::protocol::{BatchRequest, ExecutionType};
    use tokio::time::timeout;

    use super::ObsClient;
    use crate::{ClientConfig, ClientError, SessionState};

    #[tokio::test]
    async fn endpointless_client_is_idle_and_initialized() {
        let client = ObsClient::connect(ClientConfig::default())
            .await
            .expect("idle client");
        assert!(!client.is_connected());
        assert!(!client.is_identified());
        assert_eq!(client.state(), SessionState::Disconnected);
        client
            .wait_for_initialization()
            .await
            .expect("idle client is initialized");
    }

    #[tokio::test]
    async fn requests_fail_fast_while_disconnected() {
        let client = ObsClient::new(ClientConfig::default());
        for _ in 0..8 {
            assert!(matches!(
                client.send_request("GetVersion", None).await,
                Err(ClientError::NotConnected)
            ));
        }
        assert!(matches!(
            client
                .send_batch_request(
                    vec![BatchRequest::new("GetVersion", None)],
                    false,
                    ExecutionType::SerialRealtime,
                )
                .await,
            Err(ClientError::NotConnected)
        ));
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_clears_listeners() {
        let client = ObsClient::new(ClientConfig::new("127.0.0.1", 1));
        client.add_event_listener(None, |_| {});
        client.add_event_listener(Some("SceneCreated"), |_| {});
        assert_eq!(client.listener_count(), 2);

        client.close().await;
        client.close().await;

        assert_eq!(client.listener_count(), 0);
        assert_eq!(client.endpoint(), None);
        assert!(!client.is_connected());
        client
            .wait_for_initialization()
            .await
            .expect("closed client is idle");
    }

    #[tokio::test]
    async fn waiting_without_session_task_does_not_hang() {
        let client = ObsClient::new(ClientConfig::new("127.0.0.1", 1));
        let waited = timeout(Duration::from_millis(500), client.wait_for_initialization())
            .await
            .expect("returns without a session task");
        assert!(matches!(waited, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn reidentify_while_disconnected_updates_mask() {
        let client = ObsClient::new(ClientConfig::default());
        let mask = obsws_lib::protocol::EventSubscription::SCENES;
        client.reidentify(mask).expect("stored");
        assert_eq!(client.event_subscriptions(), mask);
    }
}
