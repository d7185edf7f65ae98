use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeployStage {
    Idle,
    MaintenanceOn,
    DbMigrating,
    CodeSynced,
    DependenciesInstalled,
    Restarted,
    HealthChecking,
    MaintenanceOff,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "validation",
            Self::MaintenanceOn => "maintenance on",
            Self::DbMigrating => "database migration",
            Self::CodeSynced => "code sync",
            Self::DependenciesInstalled => "dependency install",
            Self::Restarted => "restart",
            Self::HealthChecking => "health check",
            Self::MaintenanceOff => "maintenance off",
        };
        f.write_str(label)
    }
}

/// Outcome of a successful deploy or rollback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub stages: Vec<DeployStage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Read-only summary for `deploy <name> --status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStatus {
    pub service: String,
    pub live: bool,
    pub unit: String,
    pub running: bool,
}
