//! Per-server connection state machine.
//!
//! A [`Connection`] owns everything for one configured server: the resolved
//! transport, the optional HTTP agent (for pooled HTTP servers), the live MCP
//! client, and the cached capability lists. Status transitions follow
//! disconnected -> connecting -> connected, with errored reachable from any
//! failed attempt. `cleanup` permanently releases the agent; the connection
//! is single-use with respect to its pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, GetPromptRequestParam, GetPromptResult, Prompt,
    ReadResourceRequestParam, ReadResourceResult, Resource, Tool,
};
use rmcp::service::Peer;
use rmcp::RoleClient;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use mcp_hub_core::{
    merge_pool_config, validate_pool_config, ConnectionStatus, ErrorContext, HubError,
    MergedPoolConfig, PoolSettings, Result, ServerSpec, ServerStatus,
};

use super::agent::{create_agent, create_pooled_request, destroy_agent, Agent, PooledRequest};
use super::transport::{build_header_map, McpClient, ResolvedTransport, TransportFactory};

/// Lifecycle of a connection's HTTP agent.
///
/// `None` means no pool applies (stdio, or pooling disabled). Once released,
/// the slot never becomes active again.
enum PoolSlot {
    None,
    Active {
        agent: Arc<Agent>,
        request: PooledRequest,
    },
    Released,
}

#[derive(Default)]
struct ConnectionState {
    status: ConnectionStatus,
    error: Option<String>,
    last_started: Option<DateTime<Utc>>,
    tools: Vec<Tool>,
    resources: Vec<Resource>,
    prompts: Vec<Prompt>,
}

/// Connection to a single MCP server.
pub struct Connection {
    name: String,
    spec: ServerSpec,
    resolved: Option<ResolvedTransport>,
    /// Defect detected while building the connection (bad spec, bad headers,
    /// agent build failure). Surfaced as an errored connect attempt.
    construction_error: Option<String>,
    connect_timeout: Duration,
    pool: Mutex<PoolSlot>,
    state: RwLock<ConnectionState>,
    client: tokio::sync::RwLock<Option<McpClient>>,
}

impl Connection {
    /// Build a connection from a server spec.
    ///
    /// For HTTP transports with pooling enabled, the agent is created here so
    /// every connect attempt reuses the same keep-alive pool. Construction
    /// never fails; defects are recorded and reported on connect.
    pub fn new(
        name: &str,
        spec: ServerSpec,
        global_pool: &PoolSettings,
        connect_timeout: Duration,
    ) -> Self {
        let mut construction_error = None;
        let resolved = match ResolvedTransport::from_spec(&spec) {
            Ok(r) => Some(r),
            Err(e) => {
                construction_error = Some(e);
                None
            }
        };

        let mut pool = PoolSlot::None;
        if construction_error.is_none() && spec.transport.is_http() {
            // Global settings and per-server overrides get the same scrutiny.
            for settings in [*global_pool, spec.connection_pool] {
                let raw = serde_json::to_value(settings).unwrap_or(Value::Null);
                let validation = validate_pool_config(&raw);
                if !validation.valid {
                    construction_error = Some(
                        HubError::PoolConfig {
                            errors: validation.errors,
                        }
                        .to_string(),
                    );
                    break;
                }
            }
        }
        if construction_error.is_none() && spec.transport.is_http() {
            match merge_pool_config(global_pool, &spec.connection_pool) {
                MergedPoolConfig::Disabled => {
                    debug!(server_id = %name, "connection pooling disabled");
                }
                MergedPoolConfig::Enabled(config) => {
                    match Self::build_agent(name, &spec.headers, &config) {
                        Ok((agent, request)) => {
                            info!(
                                server_id = %name,
                                keep_alive_timeout_ms = config.keep_alive_timeout,
                                max_connections = config.max_connections,
                                "created connection pool"
                            );
                            pool = PoolSlot::Active { agent, request };
                        }
                        Err(e) => {
                            construction_error = Some(e);
                        }
                    }
                }
            }
        }

        Self {
            name: name.to_string(),
            spec,
            resolved,
            construction_error,
            connect_timeout,
            pool: Mutex::new(pool),
            state: RwLock::new(ConnectionState::default()),
            client: tokio::sync::RwLock::new(None),
        }
    }

    fn build_agent(
        name: &str,
        headers: &HashMap<String, String>,
        config: &mcp_hub_core::PoolConfig,
    ) -> std::result::Result<(Arc<Agent>, PooledRequest), String> {
        let header_map = build_header_map(headers)?;
        let agent = create_agent(config, header_map)
            .map_err(|e| format!("Failed to create connection pool for {}: {:#}", name, e))?;
        let request = create_pooled_request(Some(&agent)).map_err(|e| e.to_string())?;
        Ok((agent, request))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ServerSpec {
        &self.spec
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.read().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    /// The live agent, if a pool is active.
    pub fn agent(&self) -> Option<Arc<Agent>> {
        match &*self.pool.lock() {
            PoolSlot::Active { agent, .. } => Some(Arc::clone(agent)),
            _ => None,
        }
    }

    /// A dispatch handle for the active pool.
    pub fn pooled_request(&self) -> Option<PooledRequest> {
        match &*self.pool.lock() {
            PoolSlot::Active { request, .. } => Some(request.clone()),
            _ => None,
        }
    }

    /// Whether `cleanup` has already released this connection's pool.
    pub fn pool_released(&self) -> bool {
        matches!(&*self.pool.lock(), PoolSlot::Released)
    }

    /// Connect to the server and discover its capabilities.
    ///
    /// Disabled servers are skipped and stay disconnected. Failures leave the
    /// connection errored with the failure message retained for status
    /// reporting and later invoke errors.
    pub async fn connect(&self) -> Result<()> {
        if self.spec.disabled {
            debug!(server_id = %self.name, "server disabled, skipping connect");
            return Ok(());
        }

        if let Some(err) = &self.construction_error {
            self.mark_errored(err.clone());
            return Err(HubError::transport(
                err.clone(),
                ErrorContext::server(&self.name),
            ));
        }
        // from_spec succeeded if there is no construction error
        let resolved = self.resolved.as_ref().ok_or_else(|| {
            HubError::transport("transport not resolved", ErrorContext::server(&self.name))
        })?;

        self.mark_connecting();

        let transport = TransportFactory::create(
            resolved,
            self.name.clone(),
            self.pooled_request(),
            self.connect_timeout,
        );
        debug!(server_id = %self.name, transport = %transport.description(), "connecting");

        match transport.connect().await {
            super::transport::TransportConnectResult::Connected(client) => {
                let (tools, resources, prompts) = discover_capabilities(&self.name, &client).await;
                *self.client.write().await = Some(client);
                let counts = (tools.len(), resources.len(), prompts.len());
                self.mark_connected(tools, resources, prompts);
                info!(
                    server_id = %self.name,
                    tools = counts.0,
                    resources = counts.1,
                    prompts = counts.2,
                    "server connected"
                );
                Ok(())
            }
            super::transport::TransportConnectResult::Failed(error) => {
                self.mark_errored(error.clone());
                Err(HubError::transport(error, ErrorContext::server(&self.name)))
            }
        }
    }

    /// Disconnect from the server. Never fails; shutdown errors are logged
    /// and the connection still lands in the disconnected state with caches
    /// cleared.
    pub async fn disconnect(&self) {
        {
            let mut state = self.state.write();
            state.status = ConnectionStatus::Disconnecting;
        }

        if let Some(client) = self.client.write().await.take() {
            if let Err(e) = client.cancel().await {
                debug!(server_id = %self.name, error = %e, "error during client shutdown");
            }
        }

        let mut state = self.state.write();
        state.status = ConnectionStatus::Disconnected;
        state.error = None;
        state.last_started = None;
        state.tools.clear();
        state.resources.clear();
        state.prompts.clear();
        debug!(server_id = %self.name, "server disconnected");
    }

    /// Release the HTTP agent. Idempotent; a cleaned-up connection keeps its
    /// status but can no longer hand out pool handles.
    pub fn cleanup(&self) {
        let mut slot = self.pool.lock();
        if matches!(&*slot, PoolSlot::Active { .. }) {
            if let PoolSlot::Active { agent, .. } = std::mem::replace(&mut *slot, PoolSlot::Released)
            {
                destroy_agent(Some(&agent));
                info!(server_id = %self.name, "connection pool destroyed");
            }
        }
    }

    /// Re-query capability lists from an already-connected server.
    pub async fn refresh_capabilities(&self) -> Result<()> {
        let client = self.client.read().await;
        let client = client.as_ref().ok_or_else(|| {
            HubError::transport(
                format!("Server '{}' not connected", self.name),
                ErrorContext::server(&self.name),
            )
        })?;

        let (tools, resources, prompts) = discover_capabilities(&self.name, client).await;
        let mut state = self.state.write();
        state.tools = tools;
        state.resources = resources;
        state.prompts = prompts;
        Ok(())
    }

    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let context = || ErrorContext::tool_call(&self.name, tool);
        let peer = self.connected_peer(context()).await?;

        let params = CallToolRequestParam {
            name: tool.to_string().into(),
            arguments,
        };
        peer.call_tool(params)
            .await
            .map_err(|e| HubError::transport(format!("MCP tool call failed: {}", e), context()))
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let context = || ErrorContext::resource_read(&self.name, uri);
        let peer = self.connected_peer(context()).await?;

        let params = ReadResourceRequestParam {
            uri: uri.to_string().into(),
        };
        peer.read_resource(params)
            .await
            .map_err(|e| HubError::transport(format!("MCP resource read failed: {}", e), context()))
    }

    pub async fn get_prompt(
        &self,
        prompt: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<GetPromptResult> {
        let context = || ErrorContext::get_prompt(&self.name, prompt);
        let peer = self.connected_peer(context()).await?;

        let params = GetPromptRequestParam {
            name: prompt.to_string().into(),
            arguments,
        };
        peer.get_prompt(params)
            .await
            .map_err(|e| HubError::transport(format!("MCP get_prompt failed: {}", e), context()))
    }

    /// Snapshot of the connection for status reporting.
    pub fn get_status(&self) -> ServerStatus {
        let state = self.state.read();
        ServerStatus {
            name: self.name.clone(),
            transport_type: self.spec.transport,
            status: state.status,
            error: state.error.clone(),
            tools: state.tools.len(),
            resources: state.resources.len(),
            prompts: state.prompts.len(),
            last_started: state.last_started,
        }
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.state.read().tools.clone()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.state.read().resources.clone()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.state.read().prompts.clone()
    }

    async fn connected_peer(&self, context: ErrorContext) -> Result<Peer<RoleClient>> {
        if self.status() != ConnectionStatus::Connected {
            let detail = self
                .last_error()
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            return Err(HubError::transport(
                format!("Server '{}' not connected{}", self.name, detail),
                context,
            ));
        }
        let client = self.client.read().await;
        match client.as_ref() {
            Some(client) => Ok(client.peer().clone()),
            None => Err(HubError::transport(
                format!("Server '{}' has no active client", self.name),
                context,
            )),
        }
    }

    fn mark_connecting(&self) {
        let mut state = self.state.write();
        state.status = ConnectionStatus::Connecting;
        state.error = None;
        state.last_started = Some(Utc::now());
    }

    fn mark_connected(&self, tools: Vec<Tool>, resources: Vec<Resource>, prompts: Vec<Prompt>) {
        let mut state = self.state.write();
        state.status = ConnectionStatus::Connected;
        state.error = None;
        state.tools = tools;
        state.resources = resources;
        state.prompts = prompts;
    }

    fn mark_errored(&self, error: String) {
        let mut state = self.state.write();
        state.status = ConnectionStatus::Errored;
        state.error = Some(error);
    }
}

/// Fetch tool, resource, and prompt lists from a connected client.
///
/// Servers are not required to implement every capability; a refusal on one
/// list leaves that cache empty without failing the connection.
async fn discover_capabilities(
    server_id: &str,
    client: &McpClient,
) -> (Vec<Tool>, Vec<Resource>, Vec<Prompt>) {
    let tools = match client.list_all_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            warn!(server_id = %server_id, "failed to list tools: {}", e);
            Vec::new()
        }
    };

    let resources = match client.list_all_resources().await {
        Ok(resources) => resources,
        Err(e) => {
            debug!(server_id = %server_id, "server does not list resources: {}", e);
            Vec::new()
        }
    };

    let prompts = match client.list_all_prompts().await {
        Ok(prompts) => prompts,
        Err(e) => {
            debug!(server_id = %server_id, "server does not list prompts: {}", e);
            Vec::new()
        }
    };

    (tools, resources, prompts)
}
