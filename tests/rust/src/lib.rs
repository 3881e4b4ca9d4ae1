//! Shared fixtures for hub integration tests.
//!
//! Provides an in-process Streamable HTTP MCP server with a small
//! tool/prompt/resource surface, plus config builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rmcp::{
    model::*,
    service::RequestContext,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ErrorData as McpError, RoleServer, ServerHandler,
};
use tokio_util::sync::CancellationToken;

use mcp_hub_core::{HubConfig, PoolSettings, ServerSpec, TransportType};

/// Initialize tracing once per test binary. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Handler for the in-process upstream server: one echo tool, one prompt,
/// one resource. Tracks how many tool calls it has served.
#[derive(Clone)]
pub struct UpstreamHandler {
    tool_calls: Arc<AtomicUsize>,
}

impl UpstreamHandler {
    pub fn new() -> Self {
        Self {
            tool_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }
}

impl Default for UpstreamHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHandler for UpstreamHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "test-upstream-server".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let schema: Arc<serde_json::Map<String, serde_json::Value>> = Arc::new(
            serde_json::from_value(serde_json::json!({
                "type": "object",
                "properties": { "message": { "type": "string" } }
            }))
            .unwrap(),
        );
        Ok(ListToolsResult::with_all_items(vec![Tool::new(
            "echo",
            "Echo the provided message",
            schema,
        )]))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
        if params.name != "echo" {
            return Err(McpError::invalid_params(
                format!("Unknown tool: {}", params.name),
                None,
            ));
        }
        let message = params
            .arguments
            .as_ref()
            .and_then(|a| a.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("(empty)")
            .to_string();
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    async fn list_prompts(
        &self,
        _params: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        let prompt: Prompt = serde_json::from_value(serde_json::json!({
            "name": "greet",
            "description": "A greeting prompt"
        }))
        .unwrap();
        Ok(ListPromptsResult::with_all_items(vec![prompt]))
    }

    async fn get_prompt(
        &self,
        params: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        if params.name != "greet" {
            return Err(McpError::invalid_params(
                format!("Unknown prompt: {}", params.name),
                None,
            ));
        }
        let result: GetPromptResult = serde_json::from_value(serde_json::json!({
            "description": "A greeting prompt",
            "messages": [
                { "role": "user", "content": { "type": "text", "text": "Hello!" } }
            ]
        }))
        .unwrap();
        Ok(result)
    }

    async fn list_resources(
        &self,
        _params: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resource: Resource = serde_json::from_value(serde_json::json!({
            "uri": "test://info",
            "name": "info",
            "mimeType": "text/plain"
        }))
        .unwrap();
        Ok(ListResourcesResult::with_all_items(vec![resource]))
    }

    async fn read_resource(
        &self,
        params: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if params.uri != "test://info" {
            return Err(McpError::invalid_params(
                format!("Unknown resource: {}", params.uri),
                None,
            ));
        }
        let result: ReadResourceResult = serde_json::from_value(serde_json::json!({
            "contents": [
                { "uri": "test://info", "mimeType": "text/plain", "text": "upstream info" }
            ]
        }))
        .unwrap();
        Ok(result)
    }
}

/// A running in-process upstream server. Shuts down when dropped.
pub struct UpstreamServer {
    url: String,
    ct: CancellationToken,
    pub handler: UpstreamHandler,
}

impl UpstreamServer {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn shutdown(&self) {
        self.ct.cancel();
    }
}

impl Drop for UpstreamServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

/// Start an upstream MCP server on a random local port.
pub async fn start_upstream() -> UpstreamServer {
    let handler = UpstreamHandler::new();
    let ct = CancellationToken::new();

    let service_handler = handler.clone();
    let service = StreamableHttpService::new(
        move || Ok(service_handler.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(std::time::Duration::from_secs(15)),
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().unwrap();
    let url = format!("http://127.0.0.1:{}/mcp", addr.port());

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { ct_clone.cancelled().await })
            .await
            .unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    UpstreamServer { url, ct, handler }
}

/// Spec for a streamable HTTP server at the given URL.
pub fn http_spec(url: &str) -> ServerSpec {
    ServerSpec::http(TransportType::StreamableHttp, url)
}

/// Spec for a stdio server whose command does not exist.
pub fn broken_stdio_spec() -> ServerSpec {
    ServerSpec::stdio("definitely-not-a-real-command-xyz", vec![])
}

/// Hub config from named specs with default global pool settings.
pub fn config_with(servers: Vec<(&str, ServerSpec)>) -> HubConfig {
    let mut mcp_servers = HashMap::new();
    for (name, spec) in servers {
        mcp_servers.insert(name.to_string(), spec);
    }
    HubConfig {
        mcp_servers,
        connection_pool: PoolSettings::default(),
    }
}
