//! Networking primitives.
//!
//! Goals:
//! - Provide one reliable (TCP) framed channel per client.
//! - Provide the relay message catalogue used by client/server.
//! - Keep serialization explicit and versionable.
//!
//! Delivery model: sends are fire-and-forget with no acknowledgment. The
//! only ordering guarantee is per-connection FIFO, inherited from TCP.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    time,
};

use crate::math::Vec3;

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame; anything larger is a protocol violation.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-connection identifier, assigned by the server on accept.
///
/// Unique for the lifetime of one connection and never reused within a
/// server process. Keys all per-player state on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new_unique() -> Self {
        ConnId(format!("conn-{}", NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)))
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player transform on the wire: position plus yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: f32,
}

impl Transform {
    pub const fn new(position: Vec3, rotation: f32) -> Self {
        Self { position, rotation }
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Server tells the client its assigned connection identifier.
    Welcome {
        id: ConnId,
    },

    // ─── Client → server ───
    /// Announces the player's chosen name; enters the roster.
    JoinAnnounce {
        name: String,
    },
    /// Full local transform for this tick (no delta compression).
    PositionUpdate(Transform),

    // ─── Server → client(s) ───
    /// A peer joined, or (to a newcomer) a roster replay entry.
    JoinNotify {
        id: ConnId,
        name: String,
    },
    /// Position deltas addressed by the sender's connection id.
    PositionBroadcast(BTreeMap<ConnId, Transform>),
    /// A peer disconnected.
    LeaveNotify {
        id: ConnId,
    },
}

/// Reliable connection over TCP with length-prefixed JSON frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.stream.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len}");
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }

    /// Receives a message within the given timeout; `None` on timeout.
    pub async fn recv_timeout(
        &mut self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<NetMsg>> {
        match time::timeout(timeout, self.recv()).await {
            Ok(Ok(msg)) => Ok(Some(msg)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned read and write halves, so one task
    /// can drain inbound frames while another pushes outbound frames.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (r, w) = self.stream.into_split();
        (FrameReader { read: r }, FrameWriter { write: w })
    }
}

/// Read half of a split [`ReliableConn`].
#[derive(Debug)]
pub struct FrameReader {
    read: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let mut len_buf = [0u8; 4];
        self.read
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len}");
        let mut payload = vec![0u8; len];
        self.read
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }
}

/// Write half of a split [`ReliableConn`].
#[derive(Debug)]
pub struct FrameWriter {
    write: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.write.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmsg_roundtrip_bytes() {
        let msg = NetMsg::JoinNotify {
            id: ConnId("conn-7".into()),
            name: "Alice".into(),
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        let back = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn position_broadcast_keyed_by_sender() {
        let mut deltas = BTreeMap::new();
        deltas.insert(
            ConnId("conn-1".into()),
            Transform::new(Vec3::new(1.0, 0.0, 2.0), 0.5),
        );
        let msg = NetMsg::PositionBroadcast(deltas);
        let back = decode_from_bytes(&encode_to_bytes(&msg).unwrap()).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn conn_ids_are_unique() {
        let a = ConnId::new_unique();
        let b = ConnId::new_unique();
        assert_ne!(a, b);
    }
}
