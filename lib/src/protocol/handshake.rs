use serde::{Deserialize, Serialize};

use super::EventSubscription;
use crate::auth::AuthChallenge;

/// First frame on every connection, sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_studio_version: String,
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthChallenge>,
}

impl Hello {
    pub const fn requires_auth(&self) -> bool {
        self.authentication.is_some()
    }
}

/// Client reply to [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_subscriptions: Option<EventSubscription>,
}

impl Identify {
    pub const fn new(rpc_version: u32, event_subscriptions: EventSubscription) -> Self {
        Self {
            rpc_version,
            authentication: None,
            event_subscriptions: Some(event_subscriptions),
        }
    }

    #[must_use]
    pub fn with_authentication(mut self, proof: impl Into<String>) -> Self {
        self.authentication = Some(proof.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// Changes the event subscriptions of an identified session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reidentify {
    pub event_subscriptions: EventSubscription,
}
