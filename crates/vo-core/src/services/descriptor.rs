use std::path::Path;

use crate::error::{OpsError, Result};
use crate::models::DeployDescriptor;

pub const DESCRIPTOR_FILENAME: &str = "deploy.json";

/// Lockfile to install command, in priority order.
const LOCKFILE_COMMANDS: &[(&str, &str)] = &[
    ("bun.lockb", "bun install"),
    ("pnpm-lock.yaml", "pnpm install --frozen-lockfile"),
    ("yarn.lock", "yarn install --frozen-lockfile"),
    ("package-lock.json", "npm ci"),
    ("uv.lock", "uv sync"),
    ("Cargo.lock", "cargo build --release"),
];

/// Load `deploy.json` from a service's working directory. Absent means defaults.
pub fn load(working_directory: &Path) -> Result<DeployDescriptor> {
    let path = working_directory.join(DESCRIPTOR_FILENAME);
    if !path.exists() {
        return Ok(DeployDescriptor::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_json::from_str(&contents)
        .map_err(|e| OpsError::InvalidConfig(format!("{}: {e}", path.display())))
}

/// The install command to run: explicit descriptor entry, else the first
/// recognised lockfile, else nothing.
pub fn install_command(descriptor: &DeployDescriptor, working_directory: &Path) -> Option<String> {
    if let Some(explicit) = &descriptor.install {
        return Some(explicit.clone());
    }
    LOCKFILE_COMMANDS
        .iter()
        .find(|(lockfile, _)| working_directory.join(lockfile).exists())
        .map(|(_, command)| command.to_string())
}
