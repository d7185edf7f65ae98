use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{OpsError, Result};
use crate::models::{ConfigMap, ServiceConfig, ToolkitConfig};

use super::host::Host;
use super::runner::{CommandRunner, CommandSpec};

const HEADER: &str = "# Generated by vo from the service registry. Do not edit by hand.\n";

/// Render the Caddyfile for the given services. Output depends only on the
/// input, so regenerating from an unchanged registry is byte-identical.
pub fn render(services: &ConfigMap, domain: &str, maintenance_page: &str) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    out.push_str(&format!("{domain} {{\n"));
    let mut first = true;
    for service in services.values() {
        if !first {
            out.push('\n');
        }
        first = false;
        render_service(&mut out, service, maintenance_page);
    }
    out.push_str("}\n");
    out
}

fn render_service(out: &mut String, service: &ServiceConfig, maintenance_page: &str) {
    let name = &service.name;
    let port = service.port();
    out.push_str(&format!("\tredir /{name} /{name}/\n"));
    if service.live {
        let matcher = if service.structure.strip_path {
            "handle_path"
        } else {
            "handle"
        };
        out.push_str(&format!("\t{matcher} /{name}/* {{\n"));
        out.push_str(&format!("\t\treverse_proxy 127.0.0.1:{port}\n"));
        out.push_str("\t}\n");
    } else {
        out.push_str(&format!("\thandle /{name}/* {{\n"));
        out.push_str(&format!("\t\t# maintenance: port {port}\n"));
        out.push_str(&format!("\t\troot * {maintenance_page}\n"));
        out.push_str("\t\trewrite * /index.html\n");
        out.push_str("\t\tfile_server {\n");
        out.push_str("\t\t\tstatus 503\n");
        out.push_str("\t\t}\n");
        out.push_str("\t}\n");
    }
}

/// Result of regenerating the proxy config.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub caddyfile: String,
    pub written: bool,
    pub reload_error: Option<String>,
}

impl ApplyOutcome {
    /// Surface a reload failure as an error; the write itself stands.
    pub fn check_reload(&self) -> Result<()> {
        match &self.reload_error {
            Some(message) => Err(OpsError::ReloadFailed(message.clone())),
            None => Ok(()),
        }
    }
}

pub struct ProxyConfigurator {
    caddyfile_path: PathBuf,
    domain: String,
    maintenance_page: String,
    reload_argv: Vec<String>,
    host: Host,
    runner: Arc<dyn CommandRunner>,
}

impl ProxyConfigurator {
    pub fn new(config: &ToolkitConfig, host: Host, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            caddyfile_path: config.caddyfile_path.clone(),
            domain: config.domain.clone(),
            maintenance_page: config.maintenance_page.to_string_lossy().to_string(),
            reload_argv: config.reload_argv(),
            host,
            runner,
        }
    }

    pub fn render(&self, services: &ConfigMap) -> String {
        render(services, &self.domain, &self.maintenance_page)
    }

    /// Write the Caddyfile and reload the proxy. `dry_run` only renders.
    pub async fn apply(&self, services: &ConfigMap, dry_run: bool) -> Result<ApplyOutcome> {
        let caddyfile = self.render(services);
        if dry_run {
            return Ok(ApplyOutcome {
                caddyfile,
                written: false,
                reload_error: None,
            });
        }

        self.host
            .write_file(self.runner.as_ref(), &self.caddyfile_path, &caddyfile)
            .await?;
        tracing::info!(path = %self.caddyfile_path.display(), "wrote proxy config");

        let reload_error = match self.reload().await {
            Ok(()) => None,
            Err(OpsError::ReloadFailed(message)) => Some(message),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = &reload_error {
            tracing::warn!("proxy reload failed: {message}");
        }
        Ok(ApplyOutcome {
            caddyfile,
            written: true,
            reload_error,
        })
    }

    pub async fn reload(&self) -> Result<()> {
        let spec: CommandSpec = self.host.privileged(self.reload_argv.iter().cloned());
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(OpsError::ReloadFailed(format!(
                "{} exited with {}: {}",
                spec.display(),
                output.code(),
                output.stderr.trim()
            )));
        }
        tracing::info!("proxy reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{merge, ServiceState, ServiceStructure, StateMap, StructureMap};
    use crate::services::testing::FakeRunner;

    fn services(live_api: bool) -> ConfigMap {
        let mut structure = StructureMap::new();
        structure.insert("api".into(), ServiceStructure::new(3000));
        let mut docs = ServiceStructure::new(3001);
        docs.strip_path = false;
        structure.insert("docs".into(), docs);
        let mut state = StateMap::new();
        state.insert("api".into(), ServiceState { live: live_api });
        merge(&structure, &state)
    }

    #[test]
    fn renders_live_blocks() {
        let text = render(&services(true), "example.com", "/srv/maint");
        let expected = "\
# Generated by vo from the service registry. Do not edit by hand.

example.com {
\tredir /api /api/
\thandle_path /api/* {
\t\treverse_proxy 127.0.0.1:3000
\t}

\tredir /docs /docs/
\thandle /docs/* {
\t\treverse_proxy 127.0.0.1:3001
\t}
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn maintenance_block_keeps_port() {
        let text = render(&services(false), "example.com", "/srv/maint");
        let block = "\
\tredir /api /api/
\thandle /api/* {
\t\t# maintenance: port 3000
\t\troot * /srv/maint
\t\trewrite * /index.html
\t\tfile_server {
\t\t\tstatus 503
\t\t}
\t}
";
        assert!(text.contains(block), "{text}");
        assert!(!text.contains("reverse_proxy 127.0.0.1:3000"));
        assert!(text.contains("reverse_proxy 127.0.0.1:3001"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let first = render(&services(false), "example.com", "/srv/maint");
        let second = render(&services(false), "example.com", "/srv/maint");
        assert_eq!(first, second);
    }

    fn configurator(dir: &std::path::Path, runner: Arc<FakeRunner>) -> ProxyConfigurator {
        let config = ToolkitConfig {
            caddyfile_path: dir.join("Caddyfile"),
            domain: "example.com".into(),
            ..ToolkitConfig::default()
        };
        ProxyConfigurator::new(&config, Host::default(), runner)
    }

    #[tokio::test]
    async fn apply_writes_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let proxy = configurator(dir.path(), runner.clone());

        let outcome = proxy.apply(&services(true), false).await.unwrap();
        assert!(outcome.written);
        assert!(outcome.check_reload().is_ok());
        let on_disk = std::fs::read_to_string(dir.path().join("Caddyfile")).unwrap();
        assert_eq!(on_disk, outcome.caddyfile);
        assert!(runner.ran("caddy reload --config"));
    }

    #[tokio::test]
    async fn dry_run_neither_writes_nor_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let proxy = configurator(dir.path(), runner.clone());

        let outcome = proxy.apply(&services(true), true).await.unwrap();
        assert!(!outcome.written);
        assert!(!dir.path().join("Caddyfile").exists());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn reload_failure_keeps_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.fail("caddy reload", 1, "adapting config: syntax error");
        let proxy = configurator(dir.path(), runner.clone());

        let outcome = proxy.apply(&services(true), false).await.unwrap();
        assert!(outcome.written);
        assert!(dir.path().join("Caddyfile").exists());
        assert!(matches!(
            outcome.check_reload(),
            Err(OpsError::ReloadFailed(msg)) if msg.contains("syntax error")
        ));
    }
}
