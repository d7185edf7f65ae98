use serde_json::Value;

use vo_core::models::{
    ConfigMap, DeployReport, DeployStatus, Health, ServiceStatus, StatusSummary,
};

/// Left-aligned columns separated by two spaces; the last column is not padded.
fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i + 1 == row.len() {
                    cell.clone()
                } else {
                    format!("{cell:<width$}", width = widths[i])
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn state_cell(health: Health) -> String {
    format!("{} {}", health.icon(), health.label())
}

fn http_cell(status: &ServiceStatus) -> String {
    status
        .http_status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Every service, a summary line, then details for services with issues.
pub fn status_table(statuses: &[ServiceStatus]) -> String {
    let mut rows = vec![["SERVICE", "PORT", "STATE", "UNIT", "TCP", "HTTP"]
        .map(String::from)
        .to_vec()];
    for status in statuses {
        rows.push(vec![
            status.name.clone(),
            status.port.to_string(),
            state_cell(status.health()),
            status.process.unit.clone(),
            if status.port_open { "open" } else { "closed" }.to_string(),
            http_cell(status),
        ]);
    }

    let summary = StatusSummary::from_statuses(statuses);
    let mut out = table(&rows);
    out.push_str(&format!(
        "\n{} healthy, {} in maintenance, {} with issues\n",
        summary.healthy, summary.maintenance, summary.issues
    ));

    let issues: Vec<&ServiceStatus> = statuses
        .iter()
        .filter(|s| s.health() == Health::Issue)
        .collect();
    if !issues.is_empty() {
        out.push_str("\nIssues:\n");
        for status in issues {
            out.push_str(&format!(
                "  {}: {}\n    try: {}\n",
                status.name,
                status.problems().join("; "),
                status.diagnostic_command()
            ));
        }
    }
    out
}

pub fn status_detail(status: &ServiceStatus) -> String {
    let health = status.health();
    let mut out = format!("{} {}\n", status.name, state_cell(health));
    out.push_str(&format!("  url:      {}\n", status.url));
    out.push_str(&format!(
        "  live:     {}\n",
        if status.live { "yes" } else { "no (maintenance)" }
    ));
    out.push_str(&format!(
        "  process:  {} ({})\n",
        status.process.state.as_str(),
        status.process.unit
    ));
    out.push_str(&format!(
        "  port:     {} ({})\n",
        status.port,
        if status.port_open { "open" } else { "closed" }
    ));
    out.push_str(&format!("  http:     {}\n", http_cell(status)));
    if health == Health::Issue {
        for problem in status.problems() {
            out.push_str(&format!("  ✗ {problem}\n"));
        }
        out.push_str(&format!("  try: {}\n", status.diagnostic_command()));
    }
    out
}

/// JSON record for one status, with the derived health included.
pub fn status_record(status: &ServiceStatus) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(status)?;
    if let Value::Object(map) = &mut value {
        map.insert("health".into(), serde_json::to_value(status.health())?);
    }
    Ok(value)
}

pub fn status_records(statuses: &[ServiceStatus]) -> serde_json::Result<Value> {
    statuses
        .iter()
        .map(status_record)
        .collect::<serde_json::Result<Vec<_>>>()
        .map(Value::Array)
}

pub fn service_list(services: &ConfigMap) -> String {
    if services.is_empty() {
        return "no services registered\n".to_string();
    }
    let mut rows = vec![["NAME", "PORT", "PATH", "STATE", "DESCRIPTION"]
        .map(String::from)
        .to_vec()];
    for service in services.values() {
        rows.push(vec![
            service.name.clone(),
            service.port().to_string(),
            if service.structure.strip_path { "strip" } else { "full" }.to_string(),
            if service.live { "live" } else { "maintenance" }.to_string(),
            service.structure.description.clone().unwrap_or_default(),
        ]);
    }
    table(&rows)
}

pub fn deploy_report(report: &DeployReport, action: &str) -> String {
    let elapsed = (report.finished_at - report.started_at).num_seconds();
    let mut out = format!("✓ {} {action}", report.service);
    if let Some(commit) = &report.commit {
        out.push_str(&format!(" at {commit}"));
    }
    out.push_str(&format!(" ({elapsed}s)\n"));
    for warning in &report.warnings {
        out.push_str(&format!("  ⚠ {warning}\n"));
    }
    out
}

pub fn deploy_status(status: &DeployStatus) -> String {
    format!(
        "{}: {}, unit {} {}\n",
        status.service,
        if status.live { "live" } else { "in maintenance" },
        status.unit,
        if status.running { "running" } else { "down" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vo_core::models::{UnitMatch, UnitState};

    fn status(
        name: &str,
        port: u16,
        live: bool,
        unit: &str,
        state: UnitState,
        port_open: bool,
        http_status: Option<u16>,
    ) -> ServiceStatus {
        ServiceStatus {
            name: name.into(),
            port,
            live,
            process: UnitMatch {
                unit: unit.into(),
                state,
            },
            port_open,
            http_ok: matches!(http_status, Some(code) if (200..400).contains(&code)),
            http_status,
            url: format!("https://apps.example.com/{name}/"),
            checked_at: Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
        }
    }

    fn sample() -> Vec<ServiceStatus> {
        vec![
            status("api", 3000, true, "api", UnitState::Active, true, Some(200)),
            status("docs", 3002, false, "docs", UnitState::Inactive, false, None),
            status("web", 3001, true, "web-app", UnitState::Failed, false, Some(502)),
        ]
    }

    #[test]
    fn status_table_lists_issues() {
        insta::assert_snapshot!(status_table(&sample()), @r"
        SERVICE  PORT  STATE          UNIT     TCP     HTTP
        api      3000  ✓ healthy      api      open    200
        docs     3002  ◐ maintenance  docs     closed  -
        web      3001  ✗ issue        web-app  closed  502

        1 healthy, 1 in maintenance, 1 with issues

        Issues:
          web: process failed (web-app); port 3001 not listening; http returned 502
            try: journalctl -u web-app -n 50 --no-pager
        ");
    }

    #[test]
    fn healthy_table_has_no_issue_section() {
        let output = status_table(&sample()[..1]);
        assert!(output.contains("1 healthy, 0 in maintenance, 0 with issues"));
        assert!(!output.contains("Issues:"));
    }

    #[test]
    fn detail_view_suggests_diagnostics() {
        let output = status_detail(&sample()[2]);
        assert!(output.starts_with("web ✗ issue\n"));
        assert!(output.contains("  ✗ port 3001 not listening\n"));
        assert!(output.contains("try: journalctl -u web-app -n 50 --no-pager"));

        let healthy = status_detail(&sample()[0]);
        assert!(!healthy.contains("try:"));
    }

    #[test]
    fn json_records_include_health() {
        let value = status_records(&sample()).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["health"], "healthy");
        assert_eq!(records[1]["health"], "maintenance");
        assert_eq!(records[2]["process"]["unit"], "web-app");
        assert_eq!(records[2]["portOpen"], false);
        assert_eq!(records[2]["httpStatus"], 502);
        assert!(records[1].get("httpStatus").is_none());
        assert!(records[0]["checkedAt"].as_str().unwrap().starts_with("2026-10-16T12:00:00"));
    }

    #[test]
    fn deploy_status_line() {
        let status = DeployStatus {
            service: "api".into(),
            live: false,
            unit: "api-app".into(),
            running: true,
        };
        assert_eq!(
            deploy_status(&status),
            "api: in maintenance, unit api-app running\n"
        );
    }
}
