//! Connection registry.
//!
//! Maps a connection identifier to the authoritative `PlayerRecord` for that
//! connection. Single-writer: only events from the owning connection mutate
//! its record. Purely in-memory; resets on restart.
//!
//! Determinism notes:
//! - Backed by a `BTreeMap` so snapshot iteration order is stable.

use race_shared::{
    math::Vec3,
    net::{ConnId, Transform},
};
use std::collections::BTreeMap;

/// Spawn default for newly registered players.
pub const SPAWN_POSITION: Vec3 = Vec3::new(-15.0, 0.5, -15.0);
/// Spawn yaw in radians.
pub const SPAWN_ROTATION: f32 = 0.0;

/// Per-player roster state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub position: Vec3,
    pub rotation: f32,
}

/// Roster of all currently registered players, keyed by connection id.
///
/// Invariant: every live registered connection has exactly one entry, and no
/// two live connections share an identifier (uniqueness is guaranteed by the
/// transport's id assignment, not checked here).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    players: BTreeMap<ConnId, PlayerRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player at the spawn default. Overwrites idempotently if
    /// the id is somehow already present.
    pub fn register(&mut self, id: ConnId, name: String) {
        self.players.insert(
            id,
            PlayerRecord {
                name,
                position: SPAWN_POSITION,
                rotation: SPAWN_ROTATION,
            },
        );
    }

    /// Updates a player's transform. Returns whether a record existed; a
    /// late or duplicate update for an unknown id is a no-op.
    pub fn update_position(&mut self, id: &ConnId, transform: Transform) -> bool {
        match self.players.get_mut(id) {
            Some(rec) => {
                rec.position = transform.position;
                rec.rotation = transform.rotation;
                true
            }
            None => false,
        }
    }

    /// Removes a player unconditionally. No-op if absent.
    pub fn remove(&mut self, id: &ConnId) {
        self.players.remove(id);
    }

    /// Iterates `(id, name)` over all current entries except `exclude`.
    ///
    /// Used to replay the roster to a newcomer. Re-derivable from current
    /// state and deterministic (registry iteration order).
    pub fn snapshot<'a>(
        &'a self,
        exclude: &'a ConnId,
    ) -> impl Iterator<Item = (&'a ConnId, &'a str)> + 'a {
        self.players
            .iter()
            .filter(move |(id, _)| *id != exclude)
            .map(|(id, rec)| (id, rec.name.as_str()))
    }

    pub fn get(&self, id: &ConnId) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &ConnId) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
