//! STDIO transport for MCP servers.
//!
//! Handles connecting to MCP servers that run as child processes
//! communicating over stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use mcp_hub_core::TransportType;

use super::{create_client_handler, Transport, TransportConnectResult};

/// STDIO transport for child process MCP servers.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    server_id: String,
    connect_timeout: Duration,
}

impl StdioTransport {
    pub fn new(
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        server_id: String,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            command,
            args,
            env,
            server_id,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportConnectResult {
        info!(
            server_id = %self.server_id,
            command = %self.command,
            "Connecting to STDIO server"
        );

        // Validate command exists before spawning
        let command_path = match which::which(&self.command)
            .or_else(|_| which::which(format!("{}.exe", &self.command)))
        {
            Ok(path) => path,
            Err(_) => {
                let err = format!(
                    "Command not found: {}. Ensure it's installed and in PATH.",
                    self.command
                );
                error!(server_id = %self.server_id, "{}", err);
                return TransportConnectResult::Failed(err);
            }
        };

        debug!(
            server_id = %self.server_id,
            path = ?command_path,
            "Found command"
        );

        let args = self.args.clone();
        let env = self.env.clone();

        // Use the resolved command_path so the child always runs the full path
        let transport =
            match TokioChildProcess::new(Command::new(&command_path).configure(move |cmd| {
                cmd.args(&args)
                    .envs(&env)
                    .stderr(Stdio::piped())
                    .kill_on_drop(true);
            })) {
                Ok(t) => t,
                Err(e) => {
                    let err = format!("Failed to spawn process: {}", e);
                    error!(server_id = %self.server_id, "{}", err);
                    return TransportConnectResult::Failed(err);
                }
            };

        let client_handler = create_client_handler(&self.server_id);

        let connect_future = client_handler.serve(transport);
        match tokio::time::timeout(self.connect_timeout, connect_future).await {
            Ok(Ok(client)) => {
                info!(server_id = %self.server_id, "STDIO server connected");
                TransportConnectResult::Connected(client)
            }
            Ok(Err(e)) => {
                let err = format!("MCP handshake failed: {}", e);
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

    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn description(&self) -> String {
        format!("stdio: {} {:?}", self.command, self.args)
    }
}
