//! HTTP agent factory for pooled upstream connections.
//!
//! Each HTTP-based server gets its own [`Agent`] wrapping a dedicated
//! `reqwest::Client`, so connection reuse never crosses server boundaries.
//! An agent can be released exactly once; a released agent refuses to hand
//! out request handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mcp_hub_core::{HubError, PoolConfig};
use reqwest::header::HeaderMap;
use tracing::debug;

/// A dedicated HTTP client with tuned keep-alive pooling for one server.
pub struct Agent {
    client: reqwest::Client,
    config: PoolConfig,
    released: AtomicBool,
}

impl Agent {
    /// Resolved pool settings this agent was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Builds a new agent from resolved pool settings.
///
/// `default_headers` are baked into the client; since each agent serves
/// exactly one upstream server, per-server headers never leak across hosts.
pub fn create_agent(
    config: &PoolConfig,
    default_headers: HeaderMap,
) -> anyhow::Result<Arc<Agent>> {
    let client = reqwest::Client::builder()
        .default_headers(default_headers)
        .pool_idle_timeout(Duration::from_millis(config.keep_alive_timeout))
        .pool_max_idle_per_host(config.max_free_connections as usize)
        .tcp_keepalive(Duration::from_millis(config.keep_alive_timeout))
        .timeout(Duration::from_millis(config.timeout))
        .build()
        .context("failed to build pooled HTTP client")?;

    debug!(
        keep_alive_timeout_ms = config.keep_alive_timeout,
        max_free_connections = config.max_free_connections,
        timeout_ms = config.timeout,
        "created HTTP agent"
    );

    Ok(Arc::new(Agent {
        client,
        config: *config,
        released: AtomicBool::new(false),
    }))
}

/// A request handle bound to a live agent.
///
/// Handles are only issued while the agent is unreleased; dispatching through
/// a handle re-checks the released flag so an in-flight handle cannot outlive
/// its pool.
#[derive(Clone, Debug)]
pub struct PooledRequest {
    agent: Arc<Agent>,
}

impl PooledRequest {
    /// The shared pooled client backing this handle.
    pub fn client(&self) -> &reqwest::Client {
        self.agent.client()
    }

    pub async fn execute(&self, request: reqwest::Request) -> anyhow::Result<reqwest::Response> {
        if self.agent.is_released() {
            return Err(HubError::InvalidAgent {
                reason: "pool handle was already released".to_string(),
            }
            .into());
        }
        Ok(self.agent.client().execute(request).await?)
    }
}

/// Wraps an agent into a dispatch handle.
///
/// Fails with an invalid-agent error when no agent is given or the agent has
/// already been released.
pub fn create_pooled_request(agent: Option<&Arc<Agent>>) -> Result<PooledRequest, HubError> {
    let agent = agent.ok_or_else(|| HubError::InvalidAgent {
        reason: "not a connection pool handle".to_string(),
    })?;
    if agent.is_released() {
        return Err(HubError::InvalidAgent {
            reason: "pool handle was already released".to_string(),
        });
    }
    Ok(PooledRequest {
        agent: Arc::clone(agent),
    })
}

/// Marks an agent released. Passing `None` or an already-released agent is a
/// no-op, so teardown paths can call this unconditionally.
pub fn destroy_agent(agent: Option<&Agent>) {
    let Some(agent) = agent else {
        return;
    };
    if !agent.released.swap(true, Ordering::SeqCst) {
        debug!("released HTTP agent");
    }
}
