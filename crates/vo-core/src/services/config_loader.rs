use std::path::Path;

use crate::error::{OpsError, Result};
use crate::models::ToolkitConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vo/config.yaml";

/// Load toolkit settings. An explicitly requested file must exist; the
/// default location is optional and falls back to built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<ToolkitConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(OpsError::ConfigMissing(path.to_path_buf()));
            }
            path
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                tracing::debug!("no config at {DEFAULT_CONFIG_PATH}, using defaults");
                return Ok(ToolkitConfig::default());
            }
            default
        }
    };
    let contents = std::fs::read_to_string(config_path)?;
    parse(&contents)
}

pub fn parse(contents: &str) -> Result<ToolkitConfig> {
    if contents.trim().is_empty() {
        return Ok(ToolkitConfig::default());
    }
    let config: ToolkitConfig =
        serde_yaml::from_str(contents).map_err(|e| OpsError::InvalidConfig(e.to_string()))?;
    if config.domain.trim().is_empty() {
        return Err(OpsError::InvalidConfig("domain must not be empty".into()));
    }
    if config.health.attempts == 0 {
        return Err(OpsError::InvalidConfig(
            "health.attempts must be at least 1".into(),
        ));
    }
    Ok(config)
}
