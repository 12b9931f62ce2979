use std::error::Error;

use clap::Parser;
use obsws_lib::constants::DEFAULT_PORT;
use obsws_server::{ServerConfig, ServerState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod signal;

#[derive(Debug, Parser)]
#[command(name = "obsws-server", version)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "OBS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Require clients to authenticate with this password.
    #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::default();
    if let Some(password) = args.password {
        config = config.with_password(password);
    }

    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    obsws_server::run_until(listener, ServerState::new(config), signal::shutdown_signal()).await?;
    Ok(())
}
