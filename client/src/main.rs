use std::error::Error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    app::run(app::Args::parse()).await
}
