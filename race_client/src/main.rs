//! Standalone headless client binary.
//!
//! Usage:
//!   cargo run -p race_client -- [--addr 127.0.0.1:3001] [--name Player]
//!
//! Connects to the relay, joins under the given name, and drives a
//! scripted lap: accelerate with a slow steady turn, publishing the
//! transform every tick and logging roster changes. Useful for soaking
//! the relay without a browser.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use race_client::publisher::InputState;
use race_client::roster::StaticModelLoader;
use race_client::{GameClient, SessionState};
use race_shared::config::RaceConfig;
use tracing::info;

fn parse_args() -> RaceConfig {
    let mut cfg = RaceConfig::from_env();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
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
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg, Arc::new(StaticModelLoader))
        .await
        .context("connect")?;
    client.join(&cfg.player_name).await.context("join")?;

    // Display-refresh stand-in: ~60 ticks per second.
    let tick_interval = Duration::from_millis(16);
    let mut known_peers = 0;
    let mut ticks: u64 = 0;

    while client.state == SessionState::Playing {
        client
            .tick(InputState {
                accelerate: true,
                steer_left: ticks % 180 < 30,
                ..Default::default()
            })
            .await;
        client.poll(Duration::from_millis(1)).await?;

        if client.roster.len() != known_peers {
            known_peers = client.roster.len();
            info!(peers = known_peers, "Roster changed");
        }
        if ticks % 600 == 0 {
            let pos = client.car.transform.position;
            info!(x = pos.x, z = pos.z, published = client.published(), "Lap progress");
        }

        ticks += 1;
        tokio::time::sleep(tick_interval).await;
    }

    info!("Session ended");
    Ok(())
}
