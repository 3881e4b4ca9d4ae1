//! # MCP Hub Core Library
//!
//! Domain types and business rules for the MCP Hub connection
//! orchestration layer.
//!
//! ## Modules
//!
//! - `domain` - Configuration model, pool-config rules, status snapshots
//! - `error` - Boundary error taxonomy with structured context

pub mod domain;
pub mod error;

// Re-export commonly used types
pub use domain::*;
pub use error::{ErrorContext, HubError, Result};
