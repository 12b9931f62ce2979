use std::{fmt, time::Duration};

use obsws_lib::{
    auth::Secret,
    constants::{DEFAULT_PORT, DEFAULT_RECONNECT_DELAY},
    protocol::EventSubscription,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Settings for one [`ObsClient`](crate::ObsClient) session.
///
/// Without an endpoint the client stays idle: it never connects and reports
/// itself initialized straight away.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Option<Endpoint>,
    pub password: Option<Secret>,
    pub event_subscriptions: EventSubscription,
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    /// `None` waits for a response for as long as the connection lives.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            password: None,
            event_subscriptions: EventSubscription::ALL,
            auto_reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Some(Endpoint::new(host, port)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_event_subscriptions(mut self, subscriptions: EventSubscription) -> Self {
        self.event_subscriptions = subscriptions;
        self
    }

    #[must_use]
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use obsws_lib::protocol::EventSubscription;

    use super::{ClientConfig, Endpoint};

    #[test]
    fn defaults_match_protocol_expectations() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, None);
        assert_eq!(config.event_subscriptions, EventSubscription::ALL);
        assert!(config.auto_reconnect);
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn endpoint_renders_websocket_url() {
        let endpoint = Endpoint::new("127.0.0.1", 4455);
        assert_eq!(endpoint.url(), "ws://127.0.0.1:4455");
        assert_eq!(endpoint.to_string(), "127.0.0.1:4455");
    }
}
