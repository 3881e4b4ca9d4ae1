//! Connection pool: per-server MCP connections and their HTTP agents.

pub mod agent;
pub mod connection;
pub mod transport;

pub use agent::{create_agent, create_pooled_request, destroy_agent, Agent, PooledRequest};
pub use connection::Connection;
pub use transport::{ResolvedTransport, Transport, TransportConnectResult, TransportFactory};
