//! Client session lifecycle.
//!
//! One `GameClient` is one session instance. `Disconnected` is terminal:
//! starting again means constructing a fresh client. There is no automatic
//! rejoin after a mid-session transport loss.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use race_shared::{
    config::RaceConfig,
    net::{ConnId, NetMsg, ReliableConn, PROTOCOL_VERSION},
};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, warn};

use crate::{
    publisher::{InputState, LocalCar, StatePublisher},
    roster::{ModelLoader, RemotePlayerTable},
};

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session yet; the state before `connect` is called.
    Idle,
    /// Transport dial in progress (bounded retries).
    Connecting,
    /// Transport up, identity assigned; join not yet announced.
    Joining,
    /// Join announced, local objects constructed, ticking.
    Playing,
    /// Terminal. A new session requires a new client.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    /// Connection identifier assigned by the server.
    pub id: ConnId,
    pub state: SessionState,
    pub car: LocalCar,
    pub roster: RemotePlayerTable,

    conn: Option<ReliableConn>,
    publisher: StatePublisher,
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl GameClient {
    /// Dials the relay with a bounded retry policy and performs the
    /// handshake. Rejects an empty player name before any network
    /// activity. Returns a client in `Joining`.
    pub async fn connect(cfg: &RaceConfig, loader: Arc<dyn ModelLoader>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !cfg.player_name.trim().is_empty(),
            "player name must not be empty"
        );

        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(server = %addr, "Connecting to relay");

        let mut conn = dial_with_retries(addr, cfg).await?;

        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;
        let id = match conn.recv().await? {
            NetMsg::Welcome { id } => id,
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };
        info!(conn = %id, "Connected to relay");

        Ok(Self {
            id: id.clone(),
            state: SessionState::Joining,
            car: LocalCar::spawn(),
            roster: RemotePlayerTable::new(id, loader),
            conn: Some(conn),
            publisher: StatePublisher::new(),
        })
    }

    /// Announces the join and brings the session to `Playing`, respawning
    /// the local car at the session start.
    pub async fn join(&mut self, name: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.state == SessionState::Joining,
            "join() requires Joining state"
        );
        let conn = self.conn.as_mut().context("no connection")?;
        conn.send(&NetMsg::JoinAnnounce {
            name: name.trim().to_string(),
        })
        .await?;

        self.car = LocalCar::spawn();
        self.state = SessionState::Playing;
        info!(conn = %self.id, name = %name, "Joined race");
        Ok(())
    }

    /// Advances one tick: step local kinematics, publish the transform.
    /// No-op unless `Playing`. A send failure means the transport is gone
    /// and ends the session.
    pub async fn tick(&mut self, input: InputState) {
        if self.state != SessionState::Playing {
            return;
        }
        self.car.step(input);
        self.roster.apply_loaded();
        if let Err(e) = self.publisher.publish(self.conn.as_mut(), &self.car).await {
            warn!(error = %e, "Lost connection to server");
            self.drop_session();
        }
    }

    /// Drains pending relay notifications, waiting at most `wait` for the
    /// first one, and folds finished model loads into the roster. A
    /// transport error ends the session.
    pub async fn poll(&mut self, wait: Duration) -> anyhow::Result<()> {
        self.roster.apply_loaded();
        let mut wait = wait;
        loop {
            let Some(conn) = self.conn.as_mut() else {
                return Ok(());
            };
            match conn.recv_timeout(wait).await {
                Ok(Some(msg)) => {
                    self.handle_message(msg);
                    // Later messages are drained with a minimal wait.
                    wait = Duration::from_millis(1);
                }
                Ok(None) => {
                    self.roster.apply_loaded();
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Lost connection to server");
                    self.drop_session();
                    return Ok(());
                }
            }
        }
    }

    fn handle_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::JoinNotify { id, name } => {
                debug!(peer = %id, name = %name, "Peer joined");
                self.roster.on_join(id, name);
            }
            NetMsg::PositionBroadcast(deltas) => {
                self.roster.on_update(&deltas);
            }
            NetMsg::LeaveNotify { id } => {
                debug!(peer = %id, "Peer left");
                self.roster.on_leave(&id);
            }
            other => {
                debug!(msg = ?other, "Unhandled message");
            }
        }
    }

    /// Tears the session down: stops publishing and detaches all remote
    /// proxies. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            info!(conn = %self.id, "Session closed");
        }
        self.drop_session();
    }

    fn drop_session(&mut self) {
        self.conn = None;
        self.state = SessionState::Disconnected;
        self.roster.detach_all();
    }

    /// Updates emitted so far (diagnostics).
    pub fn published(&self) -> u64 {
        self.publisher.published()
    }
}

/// Bounded connect: `connect_attempts` tries, each capped by the
/// per-attempt timeout. Failure is surfaced to the caller; there is no
/// background retry after this.
async fn dial_with_retries(addr: SocketAddr, cfg: &RaceConfig) -> anyhow::Result<ReliableConn> {
    let attempts = cfg.connect_attempts.max(1);
    for attempt in 1..=attempts {
        match time::timeout(cfg.connect_timeout(), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(ReliableConn::new(stream)),
            Ok(Err(e)) => warn!(attempt, error = %e, "Connect attempt failed"),
            Err(_) => warn!(attempt, "Connect attempt timed out"),
        }
    }
    anyhow::bail!("failed to connect to {addr} after {attempts} attempts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::StaticModelLoader;

    #[tokio::test]
    async fn empty_name_is_rejected_before_dialing() {
        // An unroutable port: if validation did not run first, the bounded
        // retry would burn its timeout budget here.
        let cfg = RaceConfig {
            server_addr: "127.0.0.1:9".to_string(),
            player_name: "   ".to_string(),
            connect_attempts: 1,
            connect_timeout_ms: 10_000,
        };
        let started = std::time::Instant::now();
        let err = GameClient::connect(&cfg, Arc::new(StaticModelLoader))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("name"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn bounded_retry_gives_up() {
        let cfg = RaceConfig {
            // Reserved port nobody listens on.
            server_addr: "127.0.0.1:1".to_string(),
            player_name: "Alice".to_string(),
            connect_attempts: 2,
            connect_timeout_ms: 100,
        };
        let err = GameClient::connect(&cfg, Arc::new(StaticModelLoader))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2 attempts"), "got: {err}");
    }
}
