use std::error::Error;

use clap::Parser;
use obsws_client::{ClientConfig, EventSubscription, ObsClient};
use obsws_lib::constants::DEFAULT_PORT;
use serde_json::Value;
use tracing::info;

use crate::signal;

/// Connects to an obs-websocket server, prints events, and optionally sends one
/// request.
#[derive(Debug, Parser)]
#[command(name = "obsws", version)]
pub struct Args {
    #[arg(long, env = "OBS_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "OBS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Give up instead of retrying when the connection drops.
    #[arg(long)]
    no_reconnect: bool,

    /// Also subscribe to high-volume events such as volume meters.
    #[arg(long)]
    high_volume: bool,

    /// Raw event-subscription bitmask, replacing the default categories.
    #[arg(long)]
    subscriptions: Option<u32>,

    /// Only print events with this name.
    #[arg(long)]
    event: Option<String>,

    /// Request type to send once identified, e.g. GetVersion.
    #[arg(long)]
    request: Option<String>,

    /// JSON object passed as request data.
    #[arg(long, requires = "request")]
    data: Option<String>,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut subscriptions = self
            .subscriptions
            .map_or(EventSubscription::ALL, EventSubscription::from_bits);
        if self.high_volume {
            subscriptions |= EventSubscription::HIGH_VOLUME;
        }

        let mut config = ClientConfig::new(self.host.clone(), self.port)
            .with_event_subscriptions(subscriptions)
            .with_auto_reconnect(!self.no_reconnect);
        if let Some(password) = &self.password {
            config = config.with_password(password.as_str());
        }
        config
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let shutdown = signal::shutdown_signal();
    tokio::pin!(shutdown);

    let request_data = args
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()?;

    let client = tokio::select! {
        result = ObsClient::connect(args.client_config()) => result?,
        _ = &mut shutdown => {
            info!("shutdown signal received before identification, exiting");
            return Ok(());
        }
    };

    client.add_event_listener(args.event.as_deref(), |event| {
        println!(
            "{} (intent {:#x}): {}",
            event.event_type,
            event.event_intent.bits(),
            event.event_data
        );
    });

    if let Some(request_type) = &args.request {
        let response = tokio::select! {
            result = client.send_request(request_type.as_str(), request_data) => result?,
            _ = &mut shutdown => {
                info!("shutdown signal received while waiting for response, exiting");
                client.close().await;
                return Ok(());
            }
        };
        let status = &response.request_status;
        println!(
            "{} {} -> result={} code={}{}",
            response.request_type,
            response.request_id,
            status.result,
            status.code,
            status
                .comment
                .as_deref()
                .map(|comment| format!(" ({})", comment))
                .unwrap_or_default()
        );
        if let Some(data) = &response.response_data {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
    }

    shutdown.await;
    client.close().await;
    Ok(())
}
