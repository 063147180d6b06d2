//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how a [`Client`](crate::Client) connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the room server.
    pub endpoint: String,

    /// How long to wait for the WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:2657".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
