//! Client for the obs-websocket v5 remote-control protocol.
//!
//! An [`ObsClient`] owns one session with one server. The session task connects,
//! answers the server hello with an identify (computing the authentication proof
//! when a password is configured), reconnects after a fixed delay when the
//! connection drops, and routes inbound frames: events go to registered listeners,
//! request responses go to the caller waiting on that request id.
//!
//! ```ignore
//! use obsws_client::{ClientConfig, ObsClient};
//!
//! let client = ObsClient::connect(ClientConfig::new("localhost", 4455).with_password("pw")).await?;
//! client.add_event_listener(Some("CurrentProgramSceneChanged"), |event| {
//!     println!("{}", event.event_data);
//! });
//! let version = client.send_request("GetVersion", None).await?;
//! ```

mod client;
mod config;
mod correlator;
mod error;
mod events;
mod readiness;
mod session;
mod transport;

pub use client::ObsClient;
pub use config::{ClientConfig, Endpoint};
pub use error::ClientError;
pub use events::ListenerHandle;
pub use session::SessionState;

pub use obsws_lib::auth::Secret;
pub use obsws_lib::protocol::{
    BatchRequest, BatchResult, Event, EventSubscription, ExecutionType, RequestBatchResponse,
    RequestId, RequestResponse, RequestStatus,
};
