use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::models::{ConfigMap, ServiceConfig, ServiceStatus, ToolkitConfig};

use super::net::NetProbe;
use super::runner::CommandRunner;
use super::units;

/// Read-only health checks. Every check degrades to a negative result
/// instead of failing, so one broken service never hides the others.
pub struct StatusProber {
    config: ToolkitConfig,
    runner: Arc<dyn CommandRunner>,
    net: Arc<dyn NetProbe>,
}

impl StatusProber {
    pub fn new(
        config: ToolkitConfig,
        runner: Arc<dyn CommandRunner>,
        net: Arc<dyn NetProbe>,
    ) -> Self {
        Self {
            config,
            runner,
            net,
        }
    }

    /// Probe one service; the process, port and HTTP checks run concurrently.
    pub async fn probe(&self, service: &ServiceConfig) -> ServiceStatus {
        let url = self
            .config
            .service_url(&service.name, service.structure.health_check_path.as_deref());

        let (process, port_open, http) = tokio::join!(
            units::resolve(self.runner.as_ref(), service, &self.config.unit_naming),
            self.net.port_open(service.port(), self.config.tcp_timeout()),
            self.net.http_get(&url, self.config.http_timeout()),
        );

        ServiceStatus {
            name: service.name.clone(),
            port: service.port(),
            live: service.live,
            process,
            port_open,
            http_ok: http.ok,
            http_status: http.status,
            url,
            checked_at: Utc::now(),
        }
    }

    /// Probe every service concurrently; results come back sorted by name.
    pub async fn probe_all(&self, services: &ConfigMap) -> Vec<ServiceStatus> {
        let mut statuses = join_all(services.values().map(|s| self.probe(s))).await;
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}
