//! Transport abstraction for MCP connections.
//!
//! Each transport implementation handles the specifics of reaching an MCP
//! server over a particular protocol. The transport kind is fixed when a
//! server's config is resolved; a connection never re-dispatches to another
//! transport at connect time.

mod http;
mod stdio;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};
use rmcp::service::{NotificationContext, RunningService};
use rmcp::RoleClient;
use tracing::debug;

use mcp_hub_core::{ServerSpec, TransportType};

use super::agent::PooledRequest;
pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// Type alias for the MCP client service.
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Result of a transport connection attempt.
pub enum TransportConnectResult {
    /// Successfully connected
    Connected(McpClient),
    /// Connection failed
    Failed(String),
}

/// Transport trait for MCP connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt to connect to the MCP server
    async fn connect(&self) -> TransportConnectResult;

    /// Get the transport type
    fn transport_type(&self) -> TransportType;

    /// Get a description for logging
    fn description(&self) -> String;
}

/// Resolved transport configuration ready for connection.
///
/// Built once from a server spec; invalid specs (missing command or URL for
/// the declared type) are rejected here rather than at connect time.
#[derive(Debug, Clone)]
pub enum ResolvedTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
        headers: HashMap<String, String>,
    },
    StreamableHttp {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl ResolvedTransport {
    pub fn from_spec(spec: &ServerSpec) -> Result<Self, String> {
        match spec.transport {
            TransportType::Stdio => {
                let command = spec
                    .command
                    .clone()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| "stdio server requires a command".to_string())?;
                Ok(ResolvedTransport::Stdio {
                    command,
                    args: spec.args.clone(),
                    env: spec.env.clone(),
                })
            }
            TransportType::Sse => {
                let url = spec
                    .url
                    .clone()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| "sse server requires a url".to_string())?;
                Ok(ResolvedTransport::Sse {
                    url,
                    headers: spec.headers.clone(),
                })
            }
            TransportType::StreamableHttp => {
                let url = spec
                    .url
                    .clone()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| "streamable-http server requires a url".to_string())?;
                Ok(ResolvedTransport::StreamableHttp {
                    url,
                    headers: spec.headers.clone(),
                })
            }
        }
    }

    pub fn transport_type(&self) -> TransportType {
        match self {
            ResolvedTransport::Stdio { .. } => TransportType::Stdio,
            ResolvedTransport::Sse { .. } => TransportType::Sse,
            ResolvedTransport::StreamableHttp { .. } => TransportType::StreamableHttp,
        }
    }

    /// Get URL for HTTP transports
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolvedTransport::Sse { url, .. } | ResolvedTransport::StreamableHttp { url, .. } => {
                Some(url)
            }
            ResolvedTransport::Stdio { .. } => None,
        }
    }

    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        match self {
            ResolvedTransport::Sse { headers, .. }
            | ResolvedTransport::StreamableHttp { headers, .. } => Some(headers),
            ResolvedTransport::Stdio { .. } => None,
        }
    }
}

/// Convert string headers from a server spec into a typed header map.
pub(crate) fn build_header_map(
    headers: &HashMap<String, String>,
) -> Result<reqwest::header::HeaderMap, String> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", key, e))?;
        let header_value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| format!("Invalid header value for '{}': {}", key, e))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}

/// Client handler for MCP connections.
///
/// Identifies the hub to upstream servers and surfaces their notifications
/// into tracing.
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
    server_id: String,
}

impl std::fmt::Debug for McpClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientHandler")
            .field("server_id", &self.server_id)
            .finish()
    }
}

impl McpClientHandler {
    pub fn new(server_id: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("mcp-hub-{}", server_id),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("MCP Hub".to_string()),
                    icons: None,
                    website_url: None,
                    ..Default::default()
                },
            },
            server_id: server_id.to_string(),
        }
    }
}

impl rmcp::ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            debug!(server_id = %server_id, "server sent tools/list_changed notification");
        }
    }

    fn on_prompt_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            debug!(server_id = %server_id, "server sent prompts/list_changed notification");
        }
    }

    fn on_resource_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            debug!(server_id = %server_id, "server sent resources/list_changed notification");
        }
    }

    fn on_logging_message(
        &self,
        params: rmcp::model::LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let server_id = self.server_id.clone();
        async move {
            let message = match &params.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            debug!(
                server_id = %server_id,
                level = ?params.level,
                logger = ?params.logger,
                "server log: {}",
                message
            );
        }
    }
}

/// Create a client handler for a server connection.
pub fn create_client_handler(server_id: &str) -> McpClientHandler {
    McpClientHandler::new(server_id)
}

/// Factory for creating transports from resolved configuration.
pub struct TransportFactory;

impl TransportFactory {
    pub fn create(
        config: &ResolvedTransport,
        server_id: String,
        pooled: Option<PooledRequest>,
        connect_timeout: Duration,
    ) -> Box<dyn Transport> {
        match config {
            ResolvedTransport::Stdio { command, args, env } => Box::new(StdioTransport::new(
                command.clone(),
                args.clone(),
                env.clone(),
                server_id,
                connect_timeout,
            )),
            ResolvedTransport::Sse { url, headers } => Box::new(HttpTransport::sse(
                url.clone(),
                headers.clone(),
                server_id,
                pooled,
                connect_timeout,
            )),
            ResolvedTransport::StreamableHttp { url, headers } => {
                Box::new(HttpTransport::streamable_http(
                    url.clone(),
                    headers.clone(),
                    server_id,
                    pooled,
                    connect_timeout,
                ))
            }
        }
    }
}
