//! Connection pool configuration rules
//!
//! HTTP-based transports (SSE, streamable HTTP) reuse persistent
//! connections through a per-server pool. This module owns the pure
//! configuration rules: resolved defaults, the three-level merge
//! (defaults < global < per-server) and validation of raw config values.
//! Actual pool construction lives in the hub crate.

use serde::{Deserialize, Serialize};

/// Fully resolved pool settings. Millisecond fields are `u64`, counts are
/// `u32`. The `enabled` switch is deliberately absent: whether pooling is
/// on at all is the tag of [`MergedPoolConfig`], not a construction
/// parameter for the underlying HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle socket keep-alive timeout in milliseconds.
    pub keep_alive_timeout: u64,
    /// Maximum socket lifetime in milliseconds.
    pub keep_alive_max_timeout: u64,
    /// Maximum connections per host.
    pub max_connections: u32,
    /// Maximum idle connections kept per host.
    pub max_free_connections: u32,
    /// Socket/request timeout in milliseconds.
    pub timeout: u64,
    /// Number of pipelined requests (0 disables pipelining).
    pub pipelining: u32,
}

/// Defaults tuned for long-lived MCP servers: generous keep-alive so
/// repeated tool calls reuse warm connections, pipelining off because the
/// protocol is request-response.
pub const DEFAULT_POOL_CONFIG: PoolConfig = PoolConfig {
    keep_alive_timeout: 60_000,
    keep_alive_max_timeout: 600_000,
    max_connections: 50,
    max_free_connections: 10,
    timeout: 30_000,
    pipelining: 0,
};

impl Default for PoolConfig {
    fn default() -> Self {
        DEFAULT_POOL_CONFIG
    }
}

/// Partial pool overrides as they appear in configuration. Every key is
/// optional; absent keys fall through to the next precedence level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive_max_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_free_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipelining: Option<u32>,
}

impl PoolSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of merging global and per-server pool settings.
///
/// `Disabled` is the closed-variant rendition of a bare
/// `{"enabled": false}`: when pooling is off, no other setting matters and
/// none is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergedPoolConfig {
    Disabled,
    Enabled(PoolConfig),
}

impl MergedPoolConfig {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

/// Merge global and per-server pool settings over the compiled-in
/// defaults. Per-server values win over global, global over defaults,
/// key by key.
///
/// The `enabled` key short-circuits the merge: an explicit
/// `enabled: false` on the server (or on the global config without a
/// server-side `enabled: true` override) disables pooling outright.
pub fn merge_pool_config(global: &PoolSettings, server: &PoolSettings) -> MergedPoolConfig {
    if server.enabled == Some(false) {
        return MergedPoolConfig::Disabled;
    }
    if global.enabled == Some(false) && server.enabled != Some(true) {
        return MergedPoolConfig::Disabled;
    }

    let d = DEFAULT_POOL_CONFIG;
    MergedPoolConfig::Enabled(PoolConfig {
        keep_alive_timeout: server
            .keep_alive_timeout
            .or(global.keep_alive_timeout)
            .unwrap_or(d.keep_alive_timeout),
        keep_alive_max_timeout: server
            .keep_alive_max_timeout
            .or(global.keep_alive_max_timeout)
            .unwrap_or(d.keep_alive_max_timeout),
        max_connections: server
            .max_connections
            .or(global.max_connections)
            .unwrap_or(d.max_connections),
        max_free_connections: server
            .max_free_connections
            .or(global.max_free_connections)
            .unwrap_or(d.max_free_connections),
        timeout: server.timeout.or(global.timeout).unwrap_or(d.timeout),
        pipelining: server
            .pipelining
            .or(global.pipelining)
            .unwrap_or(d.pipelining),
    })
}

/// Validation outcome: every violation reported, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate a raw connection-pool configuration object.
///
/// Operates on untyped JSON so type errors (a string where a boolean or
/// number belongs) are reported with the offending key rather than failing
/// wholesale at deserialization. Absent keys are not errors; partial
/// configs are valid.
pub fn validate_pool_config(config: &serde_json::Value) -> PoolConfigValidation {
    let mut errors = Vec::new();

    let obj = match config.as_object() {
        Some(obj) => obj,
        None => {
            return PoolConfigValidation {
                valid: false,
                errors: vec!["connection pool config must be an object".to_string()],
            }
        }
    };

    if let Some(enabled) = obj.get("enabled") {
        if !enabled.is_boolean() {
            errors.push("enabled must be a boolean".to_string());
        }
    }

    let ranges: [(&str, u64, u64, &str); 6] = [
        ("keepAliveTimeout", 1_000, 600_000, "(1s - 10min)"),
        ("keepAliveMaxTimeout", 1_000, 3_600_000, "(1s - 1h)"),
        ("maxConnections", 1, 1_000, ""),
        ("maxFreeConnections", 0, 100, ""),
        ("timeout", 1_000, 300_000, "(1s - 5min)"),
        ("pipelining", 0, 10, ""),
    ];

    for (key, min, max, hint) in ranges {
        if let Some(value) = obj.get(key) {
            let in_range = value
                .as_u64()
                .map(|n| n >= min && n <= max)
                .unwrap_or(false);
            if !in_range {
                let hint = if hint.is_empty() {
                    String::new()
                } else {
                    format!(" {}", hint)
                };
                errors.push(format!(
                    "{} must be a number between {} and {}{}",
                    key, min, max, hint
                ));
            }
        }
    }

    PoolConfigValidation {
        valid: errors.is_empty(),
        errors,
    }
}
