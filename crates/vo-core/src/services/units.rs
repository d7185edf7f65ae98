use crate::models::{ServiceConfig, UnitMatch, UnitNaming, UnitState};

use super::runner::{CommandRunner, CommandSpec};

/// One way of deriving a unit name from a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRule {
    /// The explicit `unit` field on the service structure.
    Alias,
    Exact,
    Prefix(String),
    Suffix(String),
    /// Trailing `s` dropped before appending the suffix (`photos` -> `photo-api`).
    SingularSuffix(String),
}

impl CandidateRule {
    pub fn apply(&self, service: &ServiceConfig) -> Option<String> {
        let name = service.name.as_str();
        match self {
            Self::Alias => service.structure.unit.clone(),
            Self::Exact => Some(name.to_string()),
            Self::Prefix(prefix) => Some(format!("{prefix}{name}")),
            Self::Suffix(suffix) => Some(format!("{name}{suffix}")),
            Self::SingularSuffix(suffix) => name
                .strip_suffix('s')
                .filter(|stem| !stem.is_empty())
                .map(|stem| format!("{stem}{suffix}")),
        }
    }
}

pub fn rules(naming: &UnitNaming) -> Vec<CandidateRule> {
    let mut rules = vec![CandidateRule::Alias, CandidateRule::Exact];
    rules.extend(naming.prefixes.iter().cloned().map(CandidateRule::Prefix));
    rules.extend(naming.suffixes.iter().cloned().map(CandidateRule::Suffix));
    rules.extend(
        naming
            .suffixes
            .iter()
            .cloned()
            .map(CandidateRule::SingularSuffix),
    );
    rules
}

/// Ordered, de-duplicated unit names to try for a service.
pub fn candidates(service: &ServiceConfig, naming: &UnitNaming) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for rule in rules(naming) {
        if let Some(unit) = rule.apply(service) {
            if !names.contains(&unit) {
                names.push(unit);
            }
        }
    }
    names
}

/// Resolve which unit backs a service and report its state.
///
/// The first candidate that is active/failed, or that systemd confirms is
/// loaded, wins. Otherwise each candidate is checked for a failed condition
/// before settling on `inactive` for the first candidate.
pub async fn resolve(
    runner: &dyn CommandRunner,
    service: &ServiceConfig,
    naming: &UnitNaming,
) -> UnitMatch {
    let names = candidates(service, naming);
    let fallback = names.first().cloned().unwrap_or_else(|| service.name.clone());

    for unit in &names {
        let state = match query(runner, ["systemctl", "is-active", unit.as_str()]).await {
            Some(stdout) => UnitState::parse(&stdout),
            None => {
                return UnitMatch {
                    unit: fallback,
                    state: UnitState::Unknown,
                }
            }
        };
        if matches!(state, UnitState::Active | UnitState::Failed) {
            return UnitMatch {
                unit: unit.clone(),
                state,
            };
        }
        if unit_exists(runner, unit).await {
            let state = if state == UnitState::Unknown {
                UnitState::Inactive
            } else {
                state
            };
            return UnitMatch {
                unit: unit.clone(),
                state,
            };
        }
    }

    for unit in &names {
        if let Some(stdout) = query(runner, ["systemctl", "is-failed", unit.as_str()]).await {
            if stdout.trim() == "failed" {
                return UnitMatch {
                    unit: unit.clone(),
                    state: UnitState::Failed,
                };
            }
        }
    }

    UnitMatch {
        unit: fallback,
        state: UnitState::Inactive,
    }
}

async fn unit_exists(runner: &dyn CommandRunner, unit: &str) -> bool {
    match query(runner, ["systemctl", "show", "-p", "LoadState", "--value", unit]).await {
        Some(stdout) => stdout.trim() == "loaded",
        None => false,
    }
}

/// Stdout of a query command; `None` when it could not be run at all.
async fn query<const N: usize>(runner: &dyn CommandRunner, argv: [&str; N]) -> Option<String> {
    match runner.run(&CommandSpec::new(argv)).await {
        Ok(output) => Some(output.stdout),
        Err(e) => {
            tracing::debug!(error = %e, "systemctl query failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceStructure;
    use crate::services::testing::FakeRunner;

    fn service(name: &str, unit: Option<&str>) -> ServiceConfig {
        let mut structure = ServiceStructure::new(3000);
        structure.unit = unit.map(str::to_string);
        ServiceConfig {
            name: name.into(),
            structure,
            live: true,
        }
    }

    fn naming() -> UnitNaming {
        UnitNaming {
            prefixes: vec!["app-".into()],
            suffixes: vec!["-api".into()],
        }
    }

    #[test]
    fn candidate_order() {
        assert_eq!(
            candidates(&service("photos", Some("gallery")), &naming()),
            vec!["gallery", "photos", "app-photos", "photos-api", "photo-api"]
        );
        // no singular variant when the name has no trailing s
        assert_eq!(
            candidates(&service("api", None), &naming()),
            vec!["api", "app-api", "api-api"]
        );
    }

    #[test]
    fn alias_duplicates_are_dropped() {
        assert_eq!(
            candidates(&service("api", Some("api")), &naming()),
            vec!["api", "app-api", "api-api"]
        );
    }

    #[tokio::test]
    async fn first_active_candidate_wins() {
        let runner = FakeRunner::new();
        runner.respond("is-active photos", 3, "inactive\n");
        runner.respond("is-active app-photos", 3, "inactive\n");
        runner.respond("is-active photos-api", 0, "active\n");

        let found = resolve(&runner, &service("photos", None), &naming()).await;
        assert_eq!(
            found,
            UnitMatch {
                unit: "photos-api".into(),
                state: UnitState::Active
            }
        );
        assert!(!runner.ran("photo-api"));
    }

    #[tokio::test]
    async fn loaded_but_inactive_unit_is_accepted() {
        let runner = FakeRunner::new();
        runner.respond("is-active", 3, "inactive\n");
        runner.respond("LoadState --value app-api", 0, "loaded\n");

        let found = resolve(&runner, &service("api", None), &naming()).await;
        assert_eq!(found.unit, "app-api");
        assert_eq!(found.state, UnitState::Inactive);
    }

    #[tokio::test]
    async fn falls_back_to_failed_probe() {
        let runner = FakeRunner::new();
        runner.respond("is-active", 3, "unknown\n");
        runner.respond("LoadState", 0, "not-found\n");
        runner.respond("is-failed api-api", 0, "failed\n");

        let found = resolve(&runner, &service("api", None), &naming()).await;
        assert_eq!(found.unit, "api-api");
        assert_eq!(found.state, UnitState::Failed);
    }

    #[tokio::test]
    async fn nothing_found_reports_inactive_first_candidate() {
        let runner = FakeRunner::new();
        runner.respond("is-active", 3, "inactive\n");
        runner.respond("is-failed", 1, "inactive\n");

        let found = resolve(&runner, &service("api", None), &naming()).await;
        assert_eq!(found.unit, "api");
        assert_eq!(found.state, UnitState::Inactive);
    }

    #[tokio::test]
    async fn missing_systemctl_is_unknown() {
        let runner = FakeRunner::new();
        runner.spawn_error("systemctl");

        let found = resolve(&runner, &service("api", None), &naming()).await;
        assert_eq!(found.state, UnitState::Unknown);
        assert_eq!(found.unit, "api");
    }
}
