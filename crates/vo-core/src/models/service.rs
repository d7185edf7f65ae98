use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Versioned routing facts for one service, keyed by name in the structure document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStructure {
    pub port: u16,
    #[serde(default = "default_strip_path")]
    pub strip_path: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    /// Process-manager unit name, tried before any derived candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Account that owns the working directory and runs git/install steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn default_strip_path() -> bool {
    true
}

impl ServiceStructure {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            strip_path: true,
            description: None,
            health_check_path: None,
            unit: None,
            user: None,
        }
    }
}

/// Host-local operational state. A missing entry means `live = true`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    pub live: bool,
}

pub type StructureMap = BTreeMap<String, ServiceStructure>;
pub type StateMap = BTreeMap<String, ServiceState>;
pub type ConfigMap = BTreeMap<String, ServiceConfig>;

/// Structure merged with the resolved live flag; the view every component consumes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub name: String,
    #[serde(flatten)]
    pub structure: ServiceStructure,
    pub live: bool,
}

impl ServiceConfig {
    pub fn port(&self) -> u16 {
        self.structure.port
    }

    /// Account used for git and install steps.
    pub fn owner(&self) -> &str {
        self.structure.user.as_deref().unwrap_or(&self.name)
    }
}

/// Merge structure with state. Names only present in state are ignored.
pub fn merge(structure: &StructureMap, state: &StateMap) -> ConfigMap {
    structure
        .iter()
        .map(|(name, entry)| {
            let live = state.get(name).map(|s| s.live).unwrap_or(true);
            (
                name.clone(),
                ServiceConfig {
                    name: name.clone(),
                    structure: entry.clone(),
                    live,
                },
            )
        })
        .collect()
}
