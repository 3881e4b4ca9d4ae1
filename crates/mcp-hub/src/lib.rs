//! MCP Hub - connection orchestration for upstream MCP servers.
//!
//! The hub owns one [`pool::Connection`] per configured server, drives its
//! lifecycle (connect, disconnect, pool cleanup), and routes tool calls,
//! resource reads, and prompt fetches to the right server by name. Config
//! changes are reconciled incrementally: only added, removed, or modified
//! servers are touched.

pub mod hub;
pub mod pool;

pub use hub::{ConfigSource, HubOptions, McpHub};
pub use pool::agent::{create_agent, create_pooled_request, destroy_agent, Agent, PooledRequest};
pub use pool::connection::Connection;
pub use pool::transport::ResolvedTransport;
