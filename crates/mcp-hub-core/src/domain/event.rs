//! Configuration change contract
//!
//! The hub never parses files or watches paths itself. A config source
//! pushes [`ConfigChange`] events carrying the full new configuration plus
//! an already-computed name diff; the hub reconciles its registry against
//! that shape and nothing else.

use serde::{Deserialize, Serialize};

use super::config::HubConfig;

/// Names whose specs were added, removed, or modified between two
/// configurations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDiff {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

impl ConfigDiff {
    /// A diff with no entries requires no registry work.
    pub fn is_significant(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    /// Compute the diff between two configurations by server name.
    /// A name present in both counts as modified when its spec differs
    /// in any field, including `disabled` and pool overrides.
    pub fn between(old: &HubConfig, new: &HubConfig) -> Self {
        let mut diff = Self::default();

        for (name, spec) in &new.mcp_servers {
            match old.mcp_servers.get(name) {
                None => diff.added.push(name.clone()),
                Some(old_spec) if old_spec != spec => diff.modified.push(name.clone()),
                Some(_) => {}
            }
        }
        for name in old.mcp_servers.keys() {
            if !new.mcp_servers.contains_key(name) {
                diff.removed.push(name.clone());
            }
        }

        diff.added.sort();
        diff.removed.sort();
        diff.modified.sort();
        diff
    }
}

/// One change notification from the config source.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// The full configuration after the change.
    pub config: HubConfig,
    /// Names affected, already diffed by the source.
    pub changes: ConfigDiff,
}
