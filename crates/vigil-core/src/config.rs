//! Runtime configuration, read from the environment (after the binary loads `.env`).

use crate::chain::FACT_EXTRACTOR_AGENT;
use crate::publication::DEFAULT_BROADCAST_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_STORAGE_PATH: &str = "./data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Base directory for persisted state (`VIGIL_STORAGE_PATH`).
    pub storage_path: PathBuf,
    /// Live feed channel capacity (`VIGIL_BROADCAST_CAPACITY`).
    pub broadcast_capacity: usize,
    /// Agent label used for memory chains (`VIGIL_SOURCE_AGENT`).
    pub source_agent: String,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            source_agent: FACT_EXTRACTOR_AGENT.to_string(),
        }
    }
}

impl VigilConfig {
    /// Reads `VIGIL_*` variables; anything unset, blank or unparseable keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let storage_path = env_string("VIGIL_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);
        let broadcast_capacity = env_string("VIGIL_BROADCAST_CAPACITY")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.broadcast_capacity);
        let source_agent = env_string("VIGIL_SOURCE_AGENT").unwrap_or(defaults.source_agent);
        Self {
            storage_path,
            broadcast_capacity,
            source_agent,
        }
    }

    /// SQLite ledger location: `<storage_path>/vigil/ledger.sqlite`.
    pub fn ledger_path(&self) -> PathBuf {
        self.storage_path.join("vigil").join("ledger.sqlite")
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_lives_under_storage_path() {
        let cfg = VigilConfig {
            storage_path: PathBuf::from("/var/lib/app"),
            ..VigilConfig::default()
        };
        assert_eq!(cfg.ledger_path(), PathBuf::from("/var/lib/app/vigil/ledger.sqlite"));
    }

    #[test]
    fn defaults() {
        let cfg = VigilConfig::default();
        assert_eq!(cfg.broadcast_capacity, 256);
        assert_eq!(cfg.source_agent, "fact-extractor");
    }
}
