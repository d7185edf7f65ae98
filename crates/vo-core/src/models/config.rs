use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Host-wide toolkit settings, loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolkitConfig {
    pub structure_path: PathBuf,
    pub state_path: PathBuf,
    pub caddyfile_path: PathBuf,
    pub domain: String,
    pub maintenance_page: PathBuf,
    /// Defaults to `caddy reload --config <caddyfilePath>` when empty.
    pub reload_command: Vec<String>,
    pub services_root: PathBuf,
    pub default_branch: String,
    pub elevate: Vec<String>,
    pub unit_naming: UnitNaming,
    pub health: HealthPolicy,
    pub install_timeout_secs: u64,
    pub tcp_timeout_ms: u64,
    pub http_timeout_ms: u64,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            structure_path: PathBuf::from("/srv/vo/services.json"),
            state_path: PathBuf::from("/srv/vo/state.json"),
            caddyfile_path: PathBuf::from("/etc/caddy/Caddyfile"),
            domain: "localhost".to_string(),
            maintenance_page: PathBuf::from("/srv/vo/maintenance"),
            reload_command: Vec::new(),
            services_root: PathBuf::from("/srv"),
            default_branch: "main".to_string(),
            elevate: vec!["sudo".to_string()],
            unit_naming: UnitNaming::default(),
            health: HealthPolicy::default(),
            install_timeout_secs: 30,
            tcp_timeout_ms: 1000,
            http_timeout_ms: 3000,
        }
    }
}

impl ToolkitConfig {
    pub fn reload_argv(&self) -> Vec<String> {
        if !self.reload_command.is_empty() {
            return self.reload_command.clone();
        }
        vec![
            "caddy".to_string(),
            "reload".to_string(),
            "--config".to_string(),
            self.caddyfile_path.to_string_lossy().to_string(),
        ]
    }

    pub fn working_directory(&self, service: &str) -> PathBuf {
        self.services_root.join(service)
    }

    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Public URL probed for a service.
    pub fn service_url(&self, name: &str, health_check_path: Option<&str>) -> String {
        let scheme = if self.domain == "localhost" { "http" } else { "https" };
        match health_check_path {
            Some(path) => format!(
                "{scheme}://{}/{name}/{}",
                self.domain,
                path.trim_start_matches('/')
            ),
            None => format!("{scheme}://{}/{name}/", self.domain),
        }
    }
}

/// Rules for deriving process-manager unit names from a service name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitNaming {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

impl Default for UnitNaming {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            suffixes: vec!["-api".to_string(), "-app".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval_ms: 1000,
        }
    }
}

impl HealthPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
