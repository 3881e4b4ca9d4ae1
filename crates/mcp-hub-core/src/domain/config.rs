//! Hub configuration model
//!
//! This is the shape the hub consumes from its configuration source. It
//! follows the standard MCP client format (VS Code, Cursor, Claude Desktop):
//! transport fields (`command`/`args`/`env` or `url`/`headers`) sit at the
//! top level of each server entry, keyed by server name under `mcpServers`.
//!
//! Loading and watching configuration files is the config source's job;
//! the hub only consumes a parsed [`HubConfig`] plus an optional stream of
//! already-diffed change events (see [`super::event`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::pool::PoolSettings;

/// Transport used to reach one upstream server.
///
/// Fixed when a connection is constructed, never re-dispatched later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportType {
    #[serde(rename = "stdio")]
    Stdio,
    #[serde(rename = "sse")]
    Sse,
    #[serde(rename = "streamable-http")]
    StreamableHttp,
}

impl TransportType {
    /// HTTP-based transports share the connection-pooling layer.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Sse | Self::StreamableHttp)
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Sse => write!(f, "sse"),
            Self::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// A single server entry from configuration.
///
/// Immutable once read; reconfiguration replaces the whole spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    #[serde(rename = "type")]
    pub transport: TransportType,

    // --- Stdio transport (command-based) ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    // --- HTTP transports (URL-based) ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Disabled servers keep their registry entry but never attempt a
    /// transport session.
    #[serde(default)]
    pub disabled: bool,

    /// Per-server connection pool overrides, merged over the global ones.
    #[serde(
        rename = "connectionPool",
        default,
        skip_serializing_if = "PoolSettings::is_empty"
    )]
    pub connection_pool: PoolSettings,
}

impl ServerSpec {
    /// Minimal stdio spec, mostly for tests and programmatic configs.
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: TransportType::Stdio,
            command: Some(command.into()),
            args,
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            disabled: false,
            connection_pool: PoolSettings::default(),
        }
    }

    /// Minimal HTTP spec for the given transport kind.
    pub fn http(transport: TransportType, url: impl Into<String>) -> Self {
        Self {
            transport,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            headers: HashMap::new(),
            disabled: false,
            connection_pool: PoolSettings::default(),
        }
    }
}

/// Top-level hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, ServerSpec>,

    /// Global connection-pool overrides applied to every HTTP-based server
    /// unless shadowed by a per-server `connectionPool` block.
    #[serde(
        rename = "connectionPool",
        default,
        skip_serializing_if = "PoolSettings::is_empty"
    )]
    pub connection_pool: PoolSettings,
}
