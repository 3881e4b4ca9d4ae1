//! HTTP transports for MCP servers.
//!
//! Covers both Streamable HTTP and SSE upstreams. When the server has a
//! connection pool enabled, the shared pooled client is reused for every
//! connect; otherwise a one-off client is built per attempt.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::transport::sse_client::SseClientConfig;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{SseClientTransport, StreamableHttpClientTransport};
use rmcp::ServiceExt;
use tracing::{error, info};

use mcp_hub_core::TransportType;

use super::{build_header_map, create_client_handler, Transport, TransportConnectResult};
use crate::pool::agent::PooledRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpKind {
    Sse,
    StreamableHttp,
}

/// HTTP transport for Streamable HTTP and SSE MCP servers.
pub struct HttpTransport {
    kind: HttpKind,
    url: String,
    headers: HashMap<String, String>,
    server_id: String,
    pooled: Option<PooledRequest>,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn sse(
        url: String,
        headers: HashMap<String, String>,
        server_id: String,
        pooled: Option<PooledRequest>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            kind: HttpKind::Sse,
            url,
            headers,
            server_id,
            pooled,
            connect_timeout,
        }
    }

    pub fn streamable_http(
        url: String,
        headers: HashMap<String, String>,
        server_id: String,
        pooled: Option<PooledRequest>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            kind: HttpKind::StreamableHttp,
            url,
            headers,
            server_id,
            pooled,
            connect_timeout,
        }
    }

    /// Client for this attempt. The pooled client already carries the
    /// server's default headers; the unpooled fallback bakes them in here.
    fn http_client(&self) -> Result<reqwest::Client, String> {
        if let Some(pooled) = &self.pooled {
            return Ok(pooled.client().clone());
        }
        let header_map = build_header_map(&self.headers)?;
        reqwest::Client::builder()
            .default_headers(header_map)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> TransportConnectResult {
        info!(
            server_id = %self.server_id,
            url = %self.url,
            transport = %self.transport_type(),
            pooled = self.pooled.is_some(),
            "Connecting to HTTP server"
        );

        if let Err(e) = url::Url::parse(&self.url) {
            let err = format!("Invalid URL '{}': {}", self.url, e);
            error!(server_id = %self.server_id, "{}", err);
            return TransportConnectResult::Failed(err);
        }

        let client = match self.http_client() {
            Ok(c) => c,
            Err(err) => {
                error!(server_id = %self.server_id, "{}", err);
                return TransportConnectResult::Failed(err);
            }
        };

        let client_handler = create_client_handler(&self.server_id);

        match self.kind {
            HttpKind::StreamableHttp => {
                let transport_config = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
                let transport = StreamableHttpClientTransport::with_client(client, transport_config);

                let connect_future = client_handler.serve(transport);
                match tokio::time::timeout(self.connect_timeout, connect_future).await {
                    Ok(Ok(mcp_client)) => {
                        info!(server_id = %self.server_id, "Streamable HTTP server connected");
                        TransportConnectResult::Connected(mcp_client)
                    }
                    Ok(Err(e)) => {
                        let err = format!("HTTP connection failed: {}", e);
                        error!(server_id = %self.server_id, "{}", err);
                        TransportConnectResult::Failed(err)
                    }
                    Err(_) => {
                        let err = format!("Connection timeout ({:?})", self.connect_timeout);
                        error!(server_id = %self.server_id, "{}", err);
                        TransportConnectResult::Failed(err)
                    }
                }
            }
            HttpKind::Sse => {
                let sse_config = SseClientConfig {
                    sse_endpoint: self.url.as_str().into(),
                    ..Default::default()
                };
                let transport = match SseClientTransport::start_with_client(client, sse_config).await
                {
                    Ok(t) => t,
                    Err(e) => {
                        let err = format!("SSE connection failed: {}", e);
                        error!(server_id = %self.server_id, "{}", err);
                        return TransportConnectResult::Failed(err);
                    }
                };

                let connect_future = client_handler.serve(transport);
                match tokio::time::timeout(self.connect_timeout, connect_future).await {
                    Ok(Ok(mcp_client)) => {
                        info!(server_id = %self.server_id, "SSE server connected");
                        TransportConnectResult::Connected(mcp_client)
                    }
                    Ok(Err(e)) => {
                        let err = format!("SSE handshake failed: {}", e);
                        error!(server_id = %self.server_id, "{}", err);
                        TransportConnectResult::Failed(err)
                    }
                    Err(_) => {
                        let err = format!("Connection timeout ({:?})", self.connect_timeout);
                        error!(server_id = %self.server_id, "{}", err);
                        TransportConnectResult::Failed(err)
                    }
                }
            }
        }
    }

    fn transport_type(&self) -> TransportType {
        match self.kind {
            HttpKind::Sse => TransportType::Sse,
            HttpKind::StreamableHttp => TransportType::StreamableHttp,
        }
    }

    fn description(&self) -> String {
        format!("{}: {}", self.transport_type(), self.url)
    }
}
