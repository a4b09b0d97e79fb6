//! Configuration system.
//!
//! Loads configuration from JSON strings/files (file IO left to app), with
//! an environment override for the relay port.

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Relay listen/connect address, e.g. `127.0.0.1:3001`.
    pub server_addr: String,
    /// Player name (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Bounded connect retry: number of attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Per-attempt connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_player_name() -> String {
    "Player".to_string()
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            player_name: default_player_name(),
            connect_attempts: default_connect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Default relay port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

impl RaceConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Client-side defaults: connect to loopback, port taken from the
    /// `PORT` environment variable when set and parseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.server_addr = format!("127.0.0.1:{}", env_port());
        cfg
    }

    /// Server-side defaults: listen on all interfaces, port from `PORT`.
    pub fn listen_from_env() -> Self {
        let mut cfg = Self::default();
        cfg.server_addr = format!("0.0.0.0:{}", env_port());
        cfg
    }

    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.connect_timeout_ms)
    }
}

fn env_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let cfg = RaceConfig::default();
        assert_eq!(cfg.server_addr, "127.0.0.1:3001");
        assert_eq!(cfg.connect_attempts, 3);
        assert_eq!(cfg.connect_timeout_ms, 10_000);
    }

    #[test]
    fn env_defaults_pick_the_right_interface() {
        // The port may come from the environment; the host must not.
        assert!(RaceConfig::from_env().server_addr.starts_with("127.0.0.1:"));
        assert!(RaceConfig::listen_from_env()
            .server_addr
            .starts_with("0.0.0.0:"));
    }

    #[test]
    fn json_fills_defaults() {
        let cfg = RaceConfig::from_json_str(r#"{"server_addr":"127.0.0.1:4000"}"#).unwrap();
        assert_eq!(cfg.server_addr, "127.0.0.1:4000");
        assert_eq!(cfg.player_name, "Player");
        assert_eq!(cfg.connect_attempts, 3);
    }
}
