//! Boundary error taxonomy
//!
//! Errors raised at the hub boundary carry a kind plus a structured
//! context object so callers can route on `{server, operation, ...}`
//! without parsing message strings.

use serde::Serialize;
use thiserror::Error;

/// Structured context attached to boundary errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ErrorContext {
    pub fn server(name: impl Into<String>) -> Self {
        Self {
            server: name.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            operation: Some("tool_call"),
            tool: Some(tool.into()),
            ..Default::default()
        }
    }

    pub fn resource_read(server: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            operation: Some("resource_read"),
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn get_prompt(server: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            operation: Some("get_prompt"),
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }
}

/// Errors surfaced by the orchestration layer.
#[derive(Debug, Error)]
pub enum HubError {
    /// The operation targeted a name the registry has never seen.
    #[error("Server not found: {}", context.server)]
    NotFound { context: ErrorContext },

    /// A connect or invoke failed against a live or attempted transport.
    #[error("{message}")]
    Transport {
        message: String,
        context: ErrorContext,
    },

    /// Pool settings failed validation.
    #[error("invalid connection pool configuration: {}", errors.join("; "))]
    PoolConfig { errors: Vec<String> },

    /// A pooled request function was requested from a non-pool value.
    #[error("Invalid agent: {reason}")]
    InvalidAgent { reason: String },
}

impl HubError {
    pub fn not_found(context: ErrorContext) -> Self {
        Self::NotFound { context }
    }

    pub fn transport(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Transport {
            message: message.into(),
            context,
        }
    }

    /// Structured context for this error, when it carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::NotFound { context } | Self::Transport { context, .. } => Some(context),
            Self::PoolConfig { .. } | Self::InvalidAgent { .. } => None,
        }
    }
}

pub type Result<T, E = HubError> = std::result::Result<T, E>;
