//! Relay server.
//!
//! The relay holds no authority over movement: it registers joiners,
//! fans position reports out to everyone else, and purges on disconnect.
//!
//! Concurrency model:
//! - One reader task per connection parses frames and forwards them as
//!   [`RelayEvent`]s over a single channel.
//! - One dispatch loop owns all mutable state ([`RelayState`]) and handles
//!   each event to completion, so no locking is needed and no
//!   read-modify-write ever spans a suspend point.
//! - One writer task per connection drains that peer's outbound queue.
//!
//! A malformed or unexpected frame from one connection drops that
//! connection only; other connections are unaffected.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use race_shared::{
    config::RaceConfig,
    net::{ConnId, FrameReader, NetMsg, ReliableConn, ReliableListener, PROTOCOL_VERSION},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{broadcast::PeerMap, registry::ConnectionRegistry};

/// Inbound event for the dispatch loop.
#[derive(Debug)]
pub enum RelayEvent {
    /// A connection completed the handshake; `outbound` is its send queue.
    Connected {
        id: ConnId,
        outbound: mpsc::UnboundedSender<NetMsg>,
    },
    /// A parsed frame from a connection.
    Message { id: ConnId, msg: NetMsg },
    /// The connection's transport closed (cleanly or not).
    Disconnected { id: ConnId },
}

/// All server-side mutable state, owned by the dispatch loop.
#[derive(Debug, Default)]
pub struct RelayState {
    registry: ConnectionRegistry,
    peers: PeerMap,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn peers(&self) -> &PeerMap {
        &self.peers
    }

    /// Handles one event to completion. Synchronous so a single event is
    /// always atomic with respect to the registry.
    pub fn dispatch(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { id, outbound } => {
                self.peers.insert(id.clone(), outbound);
                info!(conn = %id, peers = self.peers.len(), "Connection established");
            }
            RelayEvent::Message { id, msg } => self.on_message(id, msg),
            RelayEvent::Disconnected { id } => self.on_disconnect(id),
        }
    }

    fn on_message(&mut self, id: ConnId, msg: NetMsg) {
        match msg {
            NetMsg::JoinAnnounce { name } => self.on_join(id, name),
            NetMsg::PositionUpdate(transform) => {
                // Silently dropped for connections that never joined.
                if self.registry.update_position(&id, transform) {
                    let mut deltas = BTreeMap::new();
                    deltas.insert(id.clone(), transform);
                    self.peers
                        .broadcast_except(&id, &NetMsg::PositionBroadcast(deltas));
                }
            }
            other => {
                debug!(conn = %id, msg = ?other, "Unexpected message from client");
            }
        }
    }

    fn on_join(&mut self, id: ConnId, name: String) {
        info!(conn = %id, name = %name, "Player joined");
        self.registry.register(id.clone(), name.clone());

        // Tell everyone else about the newcomer.
        self.peers.broadcast_except(
            &id,
            &NetMsg::JoinNotify {
                id: id.clone(),
                name,
            },
        );

        // Replay the existing roster, one entry at a time, to the newcomer
        // only.
        for (peer_id, peer_name) in self.registry.snapshot(&id) {
            self.peers.send_to(
                &id,
                NetMsg::JoinNotify {
                    id: peer_id.clone(),
                    name: peer_name.to_string(),
                },
            );
        }
    }

    fn on_disconnect(&mut self, id: ConnId) {
        let was_registered = self.registry.contains(&id);
        self.registry.remove(&id);
        self.peers.remove(&id);
        info!(conn = %id, registered = was_registered, peers = self.peers.len(), "Connection closed");

        // The leave goes to everyone remaining, joined or not; the
        // disconnecting peer cannot receive it anyway, and clients treat
        // an unknown id as a no-op.
        self.peers.broadcast_all(&NetMsg::LeaveNotify { id });
    }
}

/// Accepting relay server bound to one TCP port.
pub struct RelayServer {
    listener: ReliableListener,
}

impl RelayServer {
    /// Binds the relay to the address in `cfg`.
    pub async fn bind(cfg: &RaceConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg
            .server_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("parse server_addr {:?}: {e}", cfg.server_addr))?;
        let listener = ReliableListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the dispatch loop until the process exits.
    pub async fn run(self) -> anyhow::Result<()> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<RelayEvent>();

        let listener = self.listener;
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((conn, peer)) => {
                        let id = ConnId::new_unique();
                        debug!(conn = %id, %peer, "Accepted connection");
                        tokio::spawn(serve_connection(id, conn, events_tx.clone()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                    }
                }
            }
        });

        let mut state = RelayState::new();
        while let Some(event) = events_rx.recv().await {
            state.dispatch(event);
        }
        Ok(())
    }
}

/// Per-connection task: handshake, then pump frames until the peer goes
/// away. Emits exactly one `Disconnected` after a successful handshake.
async fn serve_connection(
    id: ConnId,
    mut conn: ReliableConn,
    events: mpsc::UnboundedSender<RelayEvent>,
) {
    match handshake(&id, &mut conn).await {
        Ok(()) => {}
        Err(e) => {
            debug!(conn = %id, error = %e, "Handshake failed");
            return;
        }
    }

    let (mut reader, mut writer) = conn.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<NetMsg>();

    if events
        .send(RelayEvent::Connected {
            id: id.clone(),
            outbound: out_tx,
        })
        .is_err()
    {
        return;
    }

    // Writer: drain this peer's outbound queue. Fire-and-forget; a write
    // failure just ends the task, the reader will observe the close.
    let writer_id = id.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = writer.send(&msg).await {
                debug!(conn = %writer_id, error = %e, "Outbound write failed");
                break;
            }
        }
    });

    read_until_closed(&id, &mut reader, &events).await;

    let _ = events.send(RelayEvent::Disconnected { id });
    writer_task.abort();
}

async fn handshake(id: &ConnId, conn: &mut ReliableConn) -> anyhow::Result<()> {
    let msg = conn.recv().await?;
    match msg {
        NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {
            conn.send(&NetMsg::Welcome { id: id.clone() }).await?;
            Ok(())
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }
}

async fn read_until_closed(
    id: &ConnId,
    reader: &mut FrameReader,
    events: &mpsc::UnboundedSender<RelayEvent>,
) {
    loop {
        match reader.recv().await {
            Ok(msg) => {
                if events
                    .send(RelayEvent::Message {
                        id: id.clone(),
                        msg,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "Read ended");
                break;
            }
        }
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral() -> anyhow::Result<(RelayServer, RaceConfig)> {
    let mut cfg = RaceConfig {
        server_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let server = RelayServer::bind(&cfg).await?;
    cfg.server_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}
