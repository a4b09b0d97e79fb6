//! Standalone relay server binary.
//!
//! Usage:
//!   cargo run -p race_server -- [--addr 127.0.0.1:3001]
//!
//! The listen port can also be set through the `PORT` environment variable
//! (default 3001). The server registers joining players, fans position
//! updates out to everyone else, and purges the roster on disconnect.
//! Static assets for the browser client are served elsewhere; this process
//! binds the relay port only.

use std::env;

use anyhow::Context;
use race_server::RelayServer;
use race_shared::config::RaceConfig;
use tracing::info;

fn parse_args() -> RaceConfig {
    let mut cfg = RaceConfig::listen_from_env();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(addr = %cfg.server_addr, "Starting relay server");

    let server = RelayServer::bind(&cfg).await.context("bind relay")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    server.run().await
}
