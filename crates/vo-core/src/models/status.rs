use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UnitState {
    Active,
    Inactive,
    Failed,
    Unknown,
}

impl UnitState {
    /// Map `systemctl is-active` output onto the states we report.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "active" | "reloading" | "activating" => Self::Active,
            "inactive" | "deactivating" => Self::Inactive,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Process-manager state together with the unit name that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnitMatch {
    pub unit: String,
    pub state: UnitState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Health {
    Healthy,
    Maintenance,
    Issue,
}

impl Health {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Healthy => "✓",
            Self::Maintenance => "◐",
            Self::Issue => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Maintenance => "maintenance",
            Self::Issue => "issue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub port: u16,
    pub live: bool,
    pub process: UnitMatch,
    pub port_open: bool,
    pub http_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub url: String,
    pub checked_at: DateTime<Utc>,
}

impl ServiceStatus {
    pub fn health(&self) -> Health {
        if !self.live {
            Health::Maintenance
        } else if self.process.state == UnitState::Active && self.port_open && self.http_ok {
            Health::Healthy
        } else {
            Health::Issue
        }
    }

    /// Human-readable description of each failing dimension. Empty unless `Issue`.
    pub fn problems(&self) -> Vec<String> {
        if self.health() != Health::Issue {
            return Vec::new();
        }
        let mut problems = Vec::new();
        if self.process.state != UnitState::Active {
            problems.push(format!(
                "process {} ({})",
                self.process.state.as_str(),
                self.process.unit
            ));
        }
        if !self.port_open {
            problems.push(format!("port {} not listening", self.port));
        }
        if !self.http_ok {
            match self.http_status {
                Some(code) => problems.push(format!("http returned {code}")),
                None => problems.push("http unreachable".to_string()),
            }
        }
        problems
    }

    pub fn diagnostic_command(&self) -> String {
        format!("journalctl -u {} -n 50 --no-pager", self.process.unit)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub healthy: usize,
    pub maintenance: usize,
    pub issues: usize,
}

impl StatusSummary {
    pub fn from_statuses(statuses: &[ServiceStatus]) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status.health() {
                Health::Healthy => summary.healthy += 1,
                Health::Maintenance => summary.maintenance += 1,
                Health::Issue => summary.issues += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(live: bool, state: UnitState, port_open: bool, http_ok: bool) -> ServiceStatus {
        ServiceStatus {
            name: "api".into(),
            port: 3000,
            live,
            process: UnitMatch {
                unit: "api-app".into(),
                state,
            },
            port_open,
            http_ok,
            http_status: if http_ok { Some(200) } else { Some(502) },
            url: "https://example.com/api/".into(),
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn classification_is_total() {
        let states = [
            UnitState::Active,
            UnitState::Inactive,
            UnitState::Failed,
            UnitState::Unknown,
        ];
        for live in [true, false] {
            for state in states {
                for port_open in [true, false] {
                    for http_ok in [true, false] {
                        let s = status(live, state, port_open, http_ok);
                        let health = s.health();
                        assert_eq!(health == Health::Maintenance, !live);
                        let healthy =
                            live && state == UnitState::Active && port_open && http_ok;
                        assert_eq!(health == Health::Healthy, healthy);
                        assert_eq!(health == Health::Issue, !s.problems().is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn maintenance_ignores_failing_checks() {
        let s = status(false, UnitState::Failed, false, false);
        assert_eq!(s.health(), Health::Maintenance);
        assert!(s.problems().is_empty());
    }

    #[test]
    fn problems_name_each_dimension() {
        let s = status(true, UnitState::Failed, false, false);
        let problems = s.problems();
        assert_eq!(
            problems,
            vec![
                "process failed (api-app)".to_string(),
                "port 3000 not listening".to_string(),
                "http returned 502".to_string(),
            ]
        );
        assert_eq!(s.diagnostic_command(), "journalctl -u api-app -n 50 --no-pager");
    }

    #[test]
    fn parse_unit_state() {
        assert_eq!(UnitState::parse("active\n"), UnitState::Active);
        assert_eq!(UnitState::parse("failed"), UnitState::Failed);
        assert_eq!(UnitState::parse("inactive"), UnitState::Inactive);
        assert_eq!(UnitState::parse("bogus"), UnitState::Unknown);
    }

    #[test]
    fn summary_counts() {
        let statuses = vec![
            status(true, UnitState::Active, true, true),
            status(false, UnitState::Inactive, false, false),
            status(true, UnitState::Active, false, true),
        ];
        let summary = StatusSummary::from_statuses(&statuses);
        assert_eq!(
            summary,
            StatusSummary {
                healthy: 1,
                maintenance: 1,
                issues: 1
            }
        );
    }
}
