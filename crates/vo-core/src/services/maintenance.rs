use crate::error::{OpsError, Result};
use crate::models::{merge, ServiceState};

use super::proxy::{ApplyOutcome, ProxyConfigurator};
use super::registry::Registry;

/// Persist the live flag for `name`, then regenerate and reload the proxy.
/// With `dry_run` nothing is persisted and the config is only rendered.
pub async fn set_live(
    registry: &Registry,
    proxy: &ProxyConfigurator,
    name: &str,
    live: bool,
    dry_run: bool,
) -> Result<ApplyOutcome> {
    let structure = registry.load_structure().await?;
    if !structure.contains_key(name) {
        return Err(OpsError::NotFound(name.to_string()));
    }
    let mut state = registry.load_state().await?;
    state.insert(name.to_string(), ServiceState { live });
    if !dry_run {
        registry.save_state(&state).await?;
        tracing::info!(
            service = name,
            "maintenance {}",
            if live { "off" } else { "on" }
        );
    }
    proxy.apply(&merge(&structure, &state), dry_run).await
}

/// Flip the live flag. Returns the new value.
pub async fn toggle(
    registry: &Registry,
    proxy: &ProxyConfigurator,
    name: &str,
    dry_run: bool,
) -> Result<(bool, ApplyOutcome)> {
    let services = registry.load().await?;
    let current = services
        .get(name)
        .ok_or_else(|| OpsError::NotFound(name.to_string()))?;
    let live = !current.live;
    let outcome = set_live(registry, proxy, name, live, dry_run).await?;
    Ok((live, outcome))
}
