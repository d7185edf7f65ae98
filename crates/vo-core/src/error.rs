use std::path::PathBuf;

use crate::models::DeployStage;

#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("config file not found at {0}")]
    ConfigMissing(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("service '{0}' already exists")]
    DuplicateName(String),

    #[error("port {port} is already used by service '{existing}'")]
    PortConflict { port: u16, existing: String },

    #[error("invalid service name '{0}' (expected lowercase letters, digits and dashes)")]
    InvalidName(String),

    #[error("service '{0}' not found")]
    NotFound(String),

    #[error("service '{0}' is not configured in the registry")]
    NotConfigured(String),

    #[error("working directory {0} does not exist")]
    DirectoryMissing(PathBuf),

    #[error("database migration for '{service}' failed: {detail}")]
    MigrationFailed { service: String, detail: String },

    #[error("deploy of '{service}' failed during {stage}: {detail}")]
    StepFailed {
        service: String,
        stage: DeployStage,
        detail: String,
    },

    #[error(
        "health check for '{service}' failed after {attempts} attempts{}",
        restore_note(.failed_restore)
    )]
    HealthCheckFailed {
        service: String,
        attempts: u32,
        /// Set when the pre-migration database could not be put back.
        failed_restore: Option<FailedRestore>,
    },

    #[error("proxy reload failed: {0}")]
    ReloadFailed(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// A database that is still on the migrated copy after a failed deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRestore {
    pub path: String,
    pub detail: String,
}

fn restore_note(failed_restore: &Option<FailedRestore>) -> String {
    match failed_restore {
        Some(restore) => format!(
            "; restoring {} from backup also failed: {}",
            restore.path, restore.detail
        ),
        None => String::new(),
    }
}

impl OpsError {
    /// The service left in maintenance mode by this failure, if any.
    pub fn stranded_service(&self) -> Option<&str> {
        match self {
            Self::StepFailed { service, .. } | Self::HealthCheckFailed { service, .. } => {
                Some(service)
            }
            _ => None,
        }
    }

    /// Commands an operator should run next to recover from this failure.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            Self::HealthCheckFailed {
                service,
                failed_restore: Some(restore),
                ..
            } => vec![
                format!("sudo cp {0}.bak.1 {0}", restore.path),
                format!("vo deploy {service} --rollback"),
                format!("vo proxy maint {service}"),
            ],
            Self::StepFailed { service, .. } | Self::HealthCheckFailed { service, .. } => vec![
                format!("vo deploy {service}"),
                format!("vo deploy {service} --rollback"),
                format!("vo proxy maint {service}"),
            ],
            Self::MigrationFailed { service, .. } => vec![format!("vo deploy {service}")],
            Self::ReloadFailed(_) => vec!["sudo systemctl status caddy".to_string()],
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failures_carry_recovery_commands() {
        let err = OpsError::StepFailed {
            service: "api".into(),
            stage: DeployStage::CodeSynced,
            detail: "merge conflict".into(),
        };
        assert_eq!(err.stranded_service(), Some("api"));
        let commands = err.remediation();
        assert!(commands.contains(&"vo deploy api --rollback".to_string()));
        assert!(commands.contains(&"vo proxy maint api".to_string()));
    }

    #[test]
    fn failed_restore_leads_with_manual_copy() {
        let err = OpsError::HealthCheckFailed {
            service: "api".into(),
            attempts: 10,
            failed_restore: Some(FailedRestore {
                path: "/data/app.db".into(),
                detail: "No space left on device".into(),
            }),
        };
        assert!(err.to_string().contains("No space left on device"));
        let commands = err.remediation();
        assert_eq!(commands[0], "sudo cp /data/app.db.bak.1 /data/app.db");
        assert!(!commands.contains(&"vo deploy api".to_string()));
        assert_eq!(err.stranded_service(), Some("api"));
    }

    #[test]
    fn configuration_errors_have_no_remediation() {
        let err = OpsError::PortConflict {
            port: 3000,
            existing: "web".into(),
        };
        assert!(err.remediation().is_empty());
        assert_eq!(err.stranded_service(), None);
        assert_eq!(err.to_string(), "port 3000 is already used by service 'web'");
    }
}
