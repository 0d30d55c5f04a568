use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use trogon_webhook_relay::env::SystemEnv;
use trogon_webhook_relay::{AppState, RelayConfig, serve, telemetry};

#[derive(Parser, Debug)]
#[command(name = "trogon-webhook-relay", about = "Authenticating webhook relay")]
struct Args {
    /// Path to the relay config file
    #[arg(long, env = "RELAY_CONFIG", default_value = "config/webhook-relay.toml")]
    config: PathBuf,

    /// Listen address, overrides `server.host`
    #[arg(long, env = "HOST")]
    host: Option<IpAddr>,

    /// Listen port, overrides `server.port`
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RelayConfig::from_file(&args.config, &SystemEnv)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    telemetry::init(config.log_level());

    let addr = config.listen_addr();
    let state = AppState::new(config, Arc::new(SystemEnv)).context("building HTTP client")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    serve(listener, state).await.context("server failed")?;
    Ok(())
}
