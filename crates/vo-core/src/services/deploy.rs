use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{FailedRestore, OpsError, Result};
use crate::models::{
    DatabaseSpec, DeployReport, DeployStage, DeployStatus, ServiceConfig, ToolkitConfig,
    UnitState,
};

use super::descriptor;
use super::git::GitCheckout;
use super::host::Host;
use super::maintenance;
use super::net::NetProbe;
use super::proxy::ProxyConfigurator;
use super::registry::Registry;
use super::runner::{run_checked, CommandRunner, CommandSpec};
use super::units;

/// Exit status `timeout(1)` reports when it kills the command.
const TIMEOUT_EXIT: i32 = 124;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Overrides the descriptor's health check for this run.
    pub health_check: Option<String>,
}

/// Drives a single deploy or rollback. Steps run strictly in order and any
/// failure after maintenance is switched on leaves it on.
pub struct Deployer {
    config: ToolkitConfig,
    registry: Registry,
    proxy: ProxyConfigurator,
    host: Host,
    runner: Arc<dyn CommandRunner>,
    net: Arc<dyn NetProbe>,
}

struct Validated {
    service: ServiceConfig,
    directory: PathBuf,
}

impl Deployer {
    pub fn new(
        config: ToolkitConfig,
        runner: Arc<dyn CommandRunner>,
        net: Arc<dyn NetProbe>,
    ) -> Self {
        let host = Host::new(config.elevate.clone());
        let registry = Registry::new(
            config.structure_path.clone(),
            config.state_path.clone(),
            host.clone(),
            runner.clone(),
        );
        let proxy = ProxyConfigurator::new(&config, host.clone(), runner.clone());
        Self {
            config,
            registry,
            proxy,
            host,
            runner,
            net,
        }
    }

    pub async fn deploy(&self, name: &str, options: &DeployOptions) -> Result<DeployReport> {
        let started_at = Utc::now();
        let Validated { service, directory } = self.validate(name).await?;
        let descriptor = descriptor::load(&directory)?;
        let mut stages = vec![DeployStage::Idle];
        let mut warnings = Vec::new();

        tracing::info!(service = name, "enabling maintenance mode");
        self.switch_live(name, false, &mut warnings).await?;
        stages.push(DeployStage::MaintenanceOn);

        let migrated = match &descriptor.database {
            Some(database) => {
                tracing::info!(service = name, "testing database migration locally");
                self.migrate_database(&service, &directory, database).await?;
                stages.push(DeployStage::DbMigrating);
                true
            }
            None => false,
        };

        let git = GitCheckout::new(
            self.runner.as_ref(),
            &self.host,
            service.owner(),
            &directory,
        );
        tracing::info!(service = name, branch = %self.config.default_branch, "pulling latest code");
        git.pull(&self.config.default_branch)
            .await
            .map_err(|e| step_failed(name, DeployStage::CodeSynced, e))?;
        stages.push(DeployStage::CodeSynced);
        let commit = git.head().await.ok();
        if let Some(commit) = &commit {
            tracing::info!(service = name, "now at {commit}");
        }

        if let Some(command) = descriptor::install_command(&descriptor, &directory) {
            self.install(&service, &directory, &command, &mut warnings)
                .await?;
            stages.push(DeployStage::DependenciesInstalled);
        }

        let unit = self.restart(&service).await?;
        stages.push(DeployStage::Restarted);

        let health_check = options
            .health_check
            .clone()
            .or(descriptor.health_check.clone());
        stages.push(DeployStage::HealthChecking);
        if !self
            .wait_healthy(&service, &directory, health_check.as_deref())
            .await
        {
            let mut failed_restore = None;
            if let Some(database) = descriptor.database.as_ref().filter(|_| migrated) {
                if let Err(e) = self.restore_database(database).await {
                    tracing::error!(path = %database.path, "database restore failed: {e}");
                    failed_restore = Some(FailedRestore {
                        path: database.path.clone(),
                        detail: e.to_string(),
                    });
                }
            }
            tracing::error!(
                service = name,
                unit = %unit,
                "health check failed; maintenance mode left on"
            );
            return Err(OpsError::HealthCheckFailed {
                service: name.to_string(),
                attempts: self.config.health.attempts,
                failed_restore,
            });
        }

        tracing::info!(service = name, "disabling maintenance mode");
        self.switch_live(name, true, &mut warnings)
            .await
            .map_err(|e| step_failed(name, DeployStage::MaintenanceOff, e))?;
        stages.push(DeployStage::MaintenanceOff);

        Ok(DeployReport {
            service: name.to_string(),
            commit,
            stages,
            warnings,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Move the checkout back one commit, restart and re-check health.
    pub async fn rollback(&self, name: &str, options: &DeployOptions) -> Result<DeployReport> {
        let started_at = Utc::now();
        let Validated { service, directory } = self.validate(name).await?;
        let descriptor = descriptor::load(&directory)?;
        let mut stages = vec![DeployStage::Idle];
        let mut warnings = Vec::new();

        self.switch_live(name, false, &mut warnings).await?;
        stages.push(DeployStage::MaintenanceOn);

        let git = GitCheckout::new(
            self.runner.as_ref(),
            &self.host,
            service.owner(),
            &directory,
        );
        tracing::info!(service = name, "resetting to previous commit");
        git.reset_to_parent()
            .await
            .map_err(|e| step_failed(name, DeployStage::CodeSynced, e))?;
        stages.push(DeployStage::CodeSynced);
        let commit = git.head().await.ok();

        self.restart(&service).await?;
        stages.push(DeployStage::Restarted);

        let health_check = options
            .health_check
            .clone()
            .or(descriptor.health_check);
        stages.push(DeployStage::HealthChecking);
        if !self
            .wait_healthy(&service, &directory, health_check.as_deref())
            .await
        {
            tracing::error!(
                service = name,
                "rolled back code is unhealthy; maintenance mode left on"
            );
            return Err(OpsError::HealthCheckFailed {
                service: name.to_string(),
                attempts: self.config.health.attempts,
                failed_restore: None,
            });
        }

        self.switch_live(name, true, &mut warnings)
            .await
            .map_err(|e| step_failed(name, DeployStage::MaintenanceOff, e))?;
        stages.push(DeployStage::MaintenanceOff);

        Ok(DeployReport {
            service: name.to_string(),
            commit,
            stages,
            warnings,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Registry flag plus a process-manager up/down check. Touches nothing.
    pub async fn status(&self, name: &str) -> Result<DeployStatus> {
        let services = self.registry.load().await?;
        let service = services
            .get(name)
            .ok_or_else(|| OpsError::NotConfigured(name.to_string()))?;
        let unit = units::resolve(self.runner.as_ref(), service, &self.config.unit_naming).await;
        Ok(DeployStatus {
            service: name.to_string(),
            live: service.live,
            running: unit.state == UnitState::Active,
            unit: unit.unit,
        })
    }

    async fn validate(&self, name: &str) -> Result<Validated> {
        let services = self.registry.load().await?;
        let service = services
            .get(name)
            .cloned()
            .ok_or_else(|| OpsError::NotConfigured(name.to_string()))?;
        let directory = self.config.working_directory(name);
        if !directory.is_dir() {
            return Err(OpsError::DirectoryMissing(directory));
        }
        Ok(Validated { service, directory })
    }

    async fn switch_live(&self, name: &str, live: bool, warnings: &mut Vec<String>) -> Result<()> {
        let outcome = maintenance::set_live(&self.registry, &self.proxy, name, live, false).await?;
        if let Err(e) = outcome.check_reload() {
            warnings.push(e.to_string());
        }
        Ok(())
    }

    async fn migrate_database(
        &self,
        service: &ServiceConfig,
        directory: &Path,
        database: &DatabaseSpec,
    ) -> Result<()> {
        let name = service.name.as_str();
        let migration_failed = |detail: String| OpsError::MigrationFailed {
            service: name.to_string(),
            detail,
        };

        let scratch_dir = tempfile::tempdir()?;
        let file_name = Path::new(&database.path)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "database".to_string());
        let scratch = scratch_dir.path().join(file_name);
        let scratch_str = scratch.to_string_lossy().to_string();

        let checks = async {
            let download = self.host.privileged([
                "install",
                "-m",
                "0666",
                database.path.as_str(),
                scratch_str.as_str(),
            ]);
            run_checked(self.runner.as_ref(), &download).await?;
            let steps = [
                ("migrate", &database.migrate),
                ("validate", &database.validate),
            ];
            for (label, command) in steps {
                let spec = CommandSpec::new(["sh", "-c", command.as_str()])
                    .cwd(directory)
                    .env("DB_PATH", scratch_str.as_str());
                let output = self.runner.run(&spec).await?;
                if !output.success() {
                    return Err(OpsError::Command(format!(
                        "{label} exited with {}: {}",
                        output.code(),
                        output.stderr.trim()
                    )));
                }
                tracing::info!(service = name, "{label} passed");
            }
            Ok::<(), OpsError>(())
        };

        if let Err(e) = checks.await {
            tracing::error!(service = name, "migration failed, restoring traffic: {e}");
            let detail = match e {
                OpsError::Command(detail) => detail,
                other => other.to_string(),
            };
            let mut ignored = Vec::new();
            self.switch_live(name, true, &mut ignored).await?;
            return Err(migration_failed(detail));
        }

        self.swap_database(database, &scratch_str)
            .await
            .map_err(|e| step_failed(name, DeployStage::DbMigrating, e))
    }

    /// Rotate backups (1 -> 2, current -> 1) then move the migrated file into place.
    async fn swap_database(&self, database: &DatabaseSpec, scratch: &str) -> Result<()> {
        let runner = self.runner.as_ref();
        let live = database.path.as_str();
        let slot1 = format!("{live}.bak.1");
        let slot2 = format!("{live}.bak.2");
        let staged = format!("{live}.new");

        if self.host.exists(runner, &slot1).await? {
            self.host.copy(runner, &slot1, &slot2).await?;
        }
        self.host.copy(runner, live, &slot1).await?;
        self.host.copy(runner, scratch, &staged).await?;
        run_checked(
            runner,
            &self
                .host
                .privileged(["chown", "--reference", live, staged.as_str()]),
        )
        .await?;
        run_checked(
            runner,
            &self
                .host
                .privileged(["chmod", "--reference", live, staged.as_str()]),
        )
        .await?;
        self.host.rename(runner, &staged, live).await?;
        tracing::info!(path = live, "database swapped, previous copy in {slot1}");
        Ok(())
    }

    async fn restore_database(&self, database: &DatabaseSpec) -> Result<()> {
        let slot1 = format!("{}.bak.1", database.path);
        tracing::warn!(path = %database.path, "restoring database from {slot1}");
        self.host
            .copy(self.runner.as_ref(), &slot1, &database.path)
            .await
    }

    async fn install(
        &self,
        service: &ServiceConfig,
        directory: &Path,
        command: &str,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let name = service.name.as_str();
        let limit = self.config.install_timeout_secs;
        let limit_arg = limit.to_string();
        tracing::info!(service = name, "installing dependencies: {command}");
        let spec = self
            .host
            .as_user(
                service.owner(),
                ["timeout", limit_arg.as_str(), "sh", "-c", command],
            )
            .cwd(directory)
            .timeout(Duration::from_secs(limit + 5));
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| step_failed(name, DeployStage::DependenciesInstalled, e))?;

        match output.status {
            Some(0) => Ok(()),
            Some(TIMEOUT_EXIT) | None => {
                let warning = format!(
                    "install '{command}' timed out after {limit}s; assuming it completed"
                );
                tracing::warn!(service = name, "{warning}");
                warnings.push(warning);
                Ok(())
            }
            Some(code) => Err(OpsError::StepFailed {
                service: name.to_string(),
                stage: DeployStage::DependenciesInstalled,
                detail: format!("'{command}' exited with {code}: {}", output.stderr.trim()),
            }),
        }
    }

    async fn restart(&self, service: &ServiceConfig) -> Result<String> {
        let name = service.name.as_str();
        let unit = units::resolve(self.runner.as_ref(), service, &self.config.unit_naming)
            .await
            .unit;
        tracing::info!(service = name, unit = %unit, "restarting");
        run_checked(
            self.runner.as_ref(),
            &self.host.privileged(["systemctl", "restart", unit.as_str()]),
        )
        .await
        .map_err(|e| step_failed(name, DeployStage::Restarted, e))?;
        Ok(unit)
    }

    /// Poll the custom check (or the TCP port) until it passes or attempts run out.
    async fn wait_healthy(
        &self,
        service: &ServiceConfig,
        directory: &Path,
        check: Option<&str>,
    ) -> bool {
        let policy = self.config.health;
        for attempt in 1..=policy.attempts {
            let healthy = match check {
                Some(command) => {
                    let spec = CommandSpec::new(["sh", "-c", command])
                        .cwd(directory)
                        .timeout(self.config.http_timeout());
                    matches!(self.runner.run(&spec).await, Ok(output) if output.success())
                }
                None => {
                    self.net
                        .port_open(service.port(), self.config.tcp_timeout())
                        .await
                }
            };
            if healthy {
                tracing::info!(service = %service.name, attempt, "healthy");
                return true;
            }
            tracing::debug!(service = %service.name, attempt, "not healthy yet");
            if attempt < policy.attempts {
                tokio::time::sleep(policy.interval()).await;
            }
        }
        false
    }
}

fn step_failed(service: &str, stage: DeployStage, error: OpsError) -> OpsError {
    let detail = match error {
        OpsError::Command(detail) => detail,
        other => other.to_string(),
    };
    tracing::error!(service, %stage, "{detail}");
    OpsError::StepFailed {
        service: service.to_string(),
        stage,
        detail,
    }
}
