//! Relay broadcasting.
//!
//! The exclusion rule ("everyone except the sender") lives in [`audience`],
//! a plain function over ids, so it can be tested without any transport.
//! [`PeerMap`] holds the outbound queue for each live connection; sends are
//! fire-and-forget with at-most-once semantics: a closed or dropped queue
//! loses the message and is never an error.

use race_shared::net::{ConnId, NetMsg};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Selects the recipients for a broadcast: all of `ids` except `exclude`.
pub fn audience<'a>(
    ids: impl IntoIterator<Item = &'a ConnId>,
    exclude: Option<&ConnId>,
) -> Vec<ConnId> {
    ids.into_iter()
        .filter(|id| Some(*id) != exclude)
        .cloned()
        .collect()
}

/// Outbound queues for all live connections.
#[derive(Debug, Default)]
pub struct PeerMap {
    peers: BTreeMap<ConnId, mpsc::UnboundedSender<NetMsg>>,
}

impl PeerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnId, outbound: mpsc::UnboundedSender<NetMsg>) {
        self.peers.insert(id, outbound);
    }

    pub fn remove(&mut self, id: &ConnId) {
        self.peers.remove(id);
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnId> {
        self.peers.keys()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Queues a message for one connection. Silently dropped if the
    /// connection is gone.
    pub fn send_to(&self, id: &ConnId, msg: NetMsg) {
        if let Some(tx) = self.peers.get(id) {
            let _ = tx.send(msg);
        }
    }

    /// Fans a message out to every connection except `exclude`.
    pub fn broadcast_except(&self, exclude: &ConnId, msg: &NetMsg) {
        for id in audience(self.peers.keys(), Some(exclude)) {
            self.send_to(&id, msg.clone());
        }
    }

    /// Fans a message out to every connection, no exclusion.
    pub fn broadcast_all(&self, msg: &NetMsg) {
        for id in audience(self.peers.keys(), None) {
            self.send_to(&id, msg.clone());
        }
    }
}
