use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::{OpsError, Result};
use crate::models::{merge, ConfigMap, ServiceStructure, StateMap, StructureMap};

use super::host::Host;
use super::runner::CommandRunner;

static SERVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap());

/// Reject a new entry whose name is malformed or taken, or whose port is in use.
pub fn check_new_service(
    structure: &StructureMap,
    name: &str,
    entry: &ServiceStructure,
) -> Result<()> {
    if !SERVICE_NAME_RE.is_match(name) {
        return Err(OpsError::InvalidName(name.to_string()));
    }
    if structure.contains_key(name) {
        return Err(OpsError::DuplicateName(name.to_string()));
    }
    if let Some((existing, _)) = structure.iter().find(|(_, s)| s.port == entry.port) {
        return Err(OpsError::PortConflict {
            port: entry.port,
            existing: existing.clone(),
        });
    }
    Ok(())
}

/// The two registry documents: versioned structure and host-local state.
pub struct Registry {
    structure_path: PathBuf,
    state_path: PathBuf,
    host: Host,
    runner: Arc<dyn CommandRunner>,
}

impl Registry {
    pub fn new(
        structure_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
        host: Host,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            structure_path: structure_path.into(),
            state_path: state_path.into(),
            host,
            runner,
        }
    }

    pub async fn load_structure(&self) -> Result<StructureMap> {
        if !self.structure_path.exists() {
            return Err(OpsError::ConfigMissing(self.structure_path.clone()));
        }
        let json = tokio::fs::read_to_string(&self.structure_path).await?;
        serde_json::from_str(&json).map_err(|e| {
            OpsError::InvalidConfig(format!("{}: {e}", self.structure_path.display()))
        })
    }

    /// A missing state file is the bootstrap case for a fresh host.
    pub async fn load_state(&self) -> Result<StateMap> {
        if !self.state_path.exists() {
            return Ok(StateMap::new());
        }
        let json = tokio::fs::read_to_string(&self.state_path).await?;
        if json.trim().is_empty() {
            return Ok(StateMap::new());
        }
        serde_json::from_str(&json)
            .map_err(|e| OpsError::InvalidConfig(format!("{}: {e}", self.state_path.display())))
    }

    pub async fn load(&self) -> Result<ConfigMap> {
        let structure = self.load_structure().await?;
        let state = self.load_state().await?;
        Ok(merge(&structure, &state))
    }

    pub async fn save_state(&self, state: &StateMap) -> Result<()> {
        let json = serde_json::to_string_pretty(state)? + "\n";
        self.host
            .write_file(self.runner.as_ref(), &self.state_path, &json)
            .await
    }

    pub async fn save_structure(&self, structure: &StructureMap) -> Result<()> {
        let json = serde_json::to_string_pretty(structure)? + "\n";
        self.host
            .write_file(self.runner.as_ref(), &self.structure_path, &json)
            .await
    }

    pub async fn add(&self, name: &str, entry: ServiceStructure) -> Result<()> {
        let mut structure = self.load_structure().await?;
        check_new_service(&structure, name, &entry)?;
        structure.insert(name.to_string(), entry);
        self.save_structure(&structure).await?;
        tracing::info!(service = name, "added to registry");
        Ok(())
    }

    /// Remove a service and prune its orphaned state entry.
    pub async fn remove(&self, name: &str) -> Result<ServiceStructure> {
        let mut structure = self.load_structure().await?;
        let removed = structure
            .remove(name)
            .ok_or_else(|| OpsError::NotFound(name.to_string()))?;
        self.save_structure(&structure).await?;

        let mut state = self.load_state().await?;
        if state.remove(name).is_some() {
            self.save_state(&state).await?;
        }
        tracing::info!(service = name, "removed from registry");
        Ok(removed)
    }
}
