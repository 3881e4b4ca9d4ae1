//! Connection status model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::TransportType;

/// Runtime connection state of one upstream server. Never persisted.
///
/// Disabled servers keep a registry entry at `Disconnected`; there is no
/// separate disabled state at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected (initial state, and terminal for each cycle)
    #[default]
    Disconnected,
    /// Transport session being established
    Connecting,
    /// Session live, capabilities cached
    Connected,
    /// Teardown in progress
    Disconnecting,
    /// Last connect or session failed; `connect()` may be retried
    Errored,
}

/// Read-only status snapshot of one registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    #[serde(rename = "transportType")]
    pub transport_type: TransportType,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Cached capability counts; all zero unless connected.
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
    #[serde(rename = "lastStarted", skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
}
