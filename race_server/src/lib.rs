//! `race_server`
//!
//! Server-side systems:
//! - Connection registry (per-player roster state)
//! - Relay broadcasting with explicit audience selection
//! - Single-threaded event dispatch over one shared registry
//!
//! Networking model:
//! - One framed TCP stream per client; per-connection FIFO, no delivery
//!   guarantee beyond that, no acknowledgments.
//! - The server holds no authority over movement; it relays what clients
//!   report.

pub mod broadcast;
pub mod registry;
pub mod relay;

pub use relay::RelayServer;
