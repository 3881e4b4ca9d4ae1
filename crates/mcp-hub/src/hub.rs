//! Hub orchestrator.
//!
//! Owns the registry of named connections, fans out connect/disconnect
//! operations with per-server fault isolation, routes invokes by name, and
//! reconciles config changes incrementally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rmcp::model::{CallToolResult, GetPromptResult, ReadResourceResult};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use mcp_hub_core::{
    ConfigChange, ErrorContext, HubConfig, HubError, Result, ServerSpec, ServerStatus,
};

use crate::pool::Connection;

/// How the hub obtains its configuration.
///
/// A plain object is a static snapshot; a watchable source additionally
/// yields [`ConfigChange`] events the hub can subscribe to.
pub enum ConfigSource {
    Object(HubConfig),
    Watchable {
        config: HubConfig,
        events: mpsc::Receiver<ConfigChange>,
    },
}

/// Hub construction options.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Subscribe to config change events when the source supports them.
    pub watch: bool,
    /// Per-server connect timeout.
    pub connect_timeout: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            watch: false,
            connect_timeout: Duration::from_secs(60),
        }
    }
}

/// Connection orchestrator for a set of configured MCP servers.
pub struct McpHub {
    connections: DashMap<String, Arc<Connection>>,
    config: RwLock<HubConfig>,
    events: Mutex<Option<mpsc::Receiver<ConfigChange>>>,
    options: HubOptions,
    watching: AtomicBool,
}

impl McpHub {
    pub fn new(source: ConfigSource, options: HubOptions) -> Arc<Self> {
        let (config, events) = match source {
            ConfigSource::Object(config) => (config, None),
            ConfigSource::Watchable { config, events } => (config, Some(events)),
        };
        Arc::new(Self {
            connections: DashMap::new(),
            config: RwLock::new(config),
            events: Mutex::new(events),
            options,
            watching: AtomicBool::new(false),
        })
    }

    /// Start all configured servers concurrently.
    ///
    /// Individual connect failures are logged and isolated; initialization
    /// itself always completes. When watching is enabled and the source is
    /// watchable, a reconciliation task is spawned.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let servers: Vec<(String, ServerSpec)> = {
            let config = self.config.read();
            config
                .mcp_servers
                .iter()
                .map(|(name, spec)| (name.clone(), spec.clone()))
                .collect()
        };
        info!(count = servers.len(), "initializing hub");

        // Re-initialization replaces any previous generation of connections
        self.disconnect_all().await;

        let mut tasks = Vec::new();
        for (name, spec) in servers {
            let disabled = spec.disabled;
            let connection = self.register_connection(&name, spec);
            if disabled {
                debug!(server_id = %name, "server disabled, not connecting");
                continue;
            }
            tasks.push(async move { (name, connection.connect().await) });
        }

        let results = join_all(tasks).await;
        let mut connected = 0usize;
        let mut failed = 0usize;
        for (name, result) in results {
            match result {
                Ok(()) => connected += 1,
                Err(e) => {
                    failed += 1;
                    error!(server_id = %name, "failed to connect: {}", e);
                }
            }
        }
        info!(connected, failed, "hub initialized");

        self.start_watching();
        Ok(())
    }

    /// Whether the hub is subscribed to config change events.
    pub fn watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    fn start_watching(self: &Arc<Self>) {
        if !self.options.watch {
            return;
        }
        let Some(mut events) = self.events.lock().take() else {
            return;
        };
        self.watching.store(true, Ordering::SeqCst);
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(change) = events.recv().await {
                hub.apply_config_change(change).await;
            }
            debug!("config event stream closed");
        });
    }

    fn register_connection(&self, name: &str, spec: ServerSpec) -> Arc<Connection> {
        let global_pool = self.config.read().connection_pool;
        let connection = Arc::new(Connection::new(
            name,
            spec,
            &global_pool,
            self.options.connect_timeout,
        ));
        self.connections
            .insert(name.to_string(), Arc::clone(&connection));
        connection
    }

    /// Connect (or reconnect) a single named server with a fresh spec.
    ///
    /// Any existing connection under that name is disconnected and its pool
    /// released before the replacement is created.
    pub async fn connect_server(&self, name: &str, spec: ServerSpec) -> Result<ServerStatus> {
        if let Some((_, old)) = self.connections.remove(name) {
            old.disconnect().await;
            old.cleanup();
        }
        self.config
            .write()
            .mcp_servers
            .insert(name.to_string(), spec.clone());

        let connection = self.register_connection(name, spec);
        connection.connect().await?;
        Ok(connection.get_status())
    }

    /// Disconnect a single named server. The registry entry is kept so the
    /// server still shows up (disconnected) in status listings, and its pool
    /// survives for a later reconnect. Unknown names are a no-op.
    pub async fn disconnect_server(&self, name: &str) {
        let connection = self.connections.get(name).map(|e| Arc::clone(e.value()));
        if let Some(connection) = connection {
            connection.disconnect().await;
            info!(server_id = %name, "server disconnected");
        }
    }

    /// Disconnect every server and clear the registry. Per-server shutdown
    /// failures are isolated.
    pub async fn disconnect_all(&self) {
        let connections: Vec<(String, Arc<Connection>)> = self
            .connections
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        if connections.is_empty() {
            return;
        }
        info!(count = connections.len(), "disconnecting all servers");

        join_all(connections.into_iter().map(|(name, connection)| async move {
            connection.disconnect().await;
            connection.cleanup();
            debug!(server_id = %name, "shut down");
        }))
        .await;

        self.connections.clear();
    }

    /// Reconcile a config change: only added, removed, or modified servers
    /// are touched. Unchanged servers keep their live connections.
    pub async fn apply_config_change(&self, change: ConfigChange) {
        if !change.changes.is_significant() {
            debug!("config change has no significant differences, ignoring");
            return;
        }
        info!(
            added = change.changes.added.len(),
            removed = change.changes.removed.len(),
            modified = change.changes.modified.len(),
            "applying config change"
        );

        *self.config.write() = change.config.clone();

        let mut tasks = Vec::new();

        for name in &change.changes.removed {
            if let Some((_, old)) = self.connections.remove(name) {
                let name = name.clone();
                tasks.push(Box::pin(async move {
                    old.disconnect().await;
                    old.cleanup();
                    info!(server_id = %name, "removed server");
                })
                    as futures::future::BoxFuture<'static, ()>);
            }
        }

        for name in change.changes.added.iter().chain(&change.changes.modified) {
            let Some(spec) = change.config.mcp_servers.get(name).cloned() else {
                warn!(server_id = %name, "changed server missing from new config");
                continue;
            };
            let modified = change.changes.modified.contains(name);
            let old = self.connections.remove(name).map(|(_, c)| c);
            let connection = self.register_connection(name, spec.clone());
            let name = name.clone();
            tasks.push(Box::pin(async move {
                if let Some(old) = old {
                    old.disconnect().await;
                    old.cleanup();
                }
                if spec.disabled {
                    debug!(server_id = %name, "server disabled, not connecting");
                    return;
                }
                match connection.connect().await {
                    Ok(()) => {
                        if modified {
                            info!(server_id = %name, "updated server");
                        } else {
                            info!(server_id = %name, "added server");
                        }
                    }
                    Err(e) => {
                        error!(server_id = %name, "failed to connect changed server: {}", e);
                    }
                }
            }) as futures::future::BoxFuture<'static, ()>);
        }

        join_all(tasks).await;
    }

    /// Call a tool on a named server.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let connection = self
            .get_connection(server)
            .ok_or_else(|| HubError::not_found(ErrorContext::tool_call(server, tool)))?;
        connection.call_tool(tool, arguments).await
    }

    /// Read a resource from a named server.
    pub async fn read_resource(&self, server: &str, uri: &str) -> Result<ReadResourceResult> {
        let connection = self
            .get_connection(server)
            .ok_or_else(|| HubError::not_found(ErrorContext::resource_read(server, uri)))?;
        connection.read_resource(uri).await
    }

    /// Fetch a prompt from a named server.
    pub async fn get_prompt(
        &self,
        server: &str,
        prompt: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<GetPromptResult> {
        let connection = self
            .get_connection(server)
            .ok_or_else(|| HubError::not_found(ErrorContext::get_prompt(server, prompt)))?;
        connection.get_prompt(prompt, arguments).await
    }

    /// Status snapshot for one server.
    pub fn get_status(&self, server: &str) -> Result<ServerStatus> {
        self.get_connection(server)
            .map(|c| c.get_status())
            .ok_or_else(|| HubError::not_found(ErrorContext::server(server)))
    }

    /// Status snapshots for every registered server.
    pub fn get_all_statuses(&self) -> Vec<ServerStatus> {
        let mut statuses: Vec<ServerStatus> = self
            .connections
            .iter()
            .map(|e| e.value().get_status())
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Re-query capability lists for one connected server.
    pub async fn refresh_server(&self, server: &str) -> Result<ServerStatus> {
        let connection = self
            .get_connection(server)
            .ok_or_else(|| HubError::not_found(ErrorContext::server(server)))?;
        connection.refresh_capabilities().await?;
        Ok(connection.get_status())
    }

    /// Re-query capability lists for all servers; failures are isolated.
    pub async fn refresh_all_servers(&self) -> Vec<ServerStatus> {
        let connections: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        join_all(connections.iter().map(|connection| async move {
            if let Err(e) = connection.refresh_capabilities().await {
                debug!(server_id = %connection.name(), "refresh skipped: {}", e);
            }
        }))
        .await;

        self.get_all_statuses()
    }

    pub fn get_connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn server_count(&self) -> usize {
        self.connections.len()
    }
}
