//! `race_client`
//!
//! Client-side systems:
//! - Session lifecycle (connect with bounded retry, join, play, disconnect)
//! - Remote player table driven by relay notifications
//! - Local car kinematics and per-tick state publishing
//!
//! Rendering, scene construction, and asset decoding are external
//! collaborators; the model-loader seam is the only contact point.

pub mod client;
pub mod publisher;
pub mod roster;

pub use client::{GameClient, SessionState};
