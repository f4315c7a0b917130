use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use huddle_core::IceServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use huddle_server::config::ServerConfig;
use huddle_server::registry::RegistryHandle;
use huddle_server::signaling::{AppState, app};

#[derive(Parser)]
#[command(name = "huddle-server", about = "Room coordinator and voice signaling relay")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// STUN/TURN url to hand to clients (repeatable). Public STUN is used
    /// when none are given.
    #[arg(long = "ice-url")]
    ice_urls: Vec<String>,

    /// Username for the configured TURN urls.
    #[arg(long)]
    turn_username: Option<String>,

    /// Credential for the configured TURN urls.
    #[arg(long)]
    turn_credential: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_server=info".into()),
        )
        .init();

    let args = Args::parse();

    let ice_servers = if args.ice_urls.is_empty() {
        ServerConfig::default_ice_servers()
    } else {
        vec![IceServerConfig {
            urls: args.ice_urls,
            username: args.turn_username,
            credential: args.turn_credential,
        }]
    };

    let config = ServerConfig {
        bind: args.bind,
        port: args.port,
        ice_servers,
    };

    let registry = RegistryHandle::spawn();
    let state = Arc::new(AppState::new(registry, config.ice_servers.clone()));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("huddle-server listening on {}", addr);

    axum::serve(listener, app(state))
        .await
        .context("server terminated")?;

    Ok(())
}
