//! Scripted stand-ins for the command and network capabilities.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{OpsError, Result};

use super::net::{HttpOutcome, NetProbe};
use super::runner::{CommandOutput, CommandRunner, CommandSpec};

enum Reply {
    Output(CommandOutput),
    SpawnError,
}

/// Matches commands by substring of the joined argv. The most recently
/// added matching rule wins; unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, needle: &str, status: i32, stdout: &str) -> &Self {
        self.rules.lock().unwrap().push((
            needle.to_string(),
            Reply::Output(CommandOutput {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        ));
        self
    }

    pub fn fail(&self, needle: &str, status: i32, stderr: &str) -> &Self {
        self.rules.lock().unwrap().push((
            needle.to_string(),
            Reply::Output(CommandOutput {
                status: Some(status),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        ));
        self
    }

    pub fn spawn_error(&self, needle: &str) -> &Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Reply::SpawnError));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(CommandSpec::display)
            .collect()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let line = spec.display();
        let rules = self.rules.lock().unwrap();
        match rules.iter().rev().find(|(needle, _)| line.contains(needle)) {
            Some((_, Reply::Output(output))) => Ok(output.clone()),
            Some((_, Reply::SpawnError)) => Err(OpsError::Command(format!("cannot run {line}"))),
            None => Ok(CommandOutput {
                status: Some(0),
                ..CommandOutput::default()
            }),
        }
    }
}

/// Ports open after a configured number of checks; HTTP replies by URL.
#[derive(Default)]
pub struct FakeNet {
    open_after: Mutex<HashMap<u16, u32>>,
    checks: Mutex<HashMap<u16, u32>>,
    http: Mutex<HashMap<String, HttpOutcome>>,
}

impl FakeNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, port: u16) -> &Self {
        self.open_after(port, 1)
    }

    /// The port reports open from the `checks`-th probe onwards.
    pub fn open_after(&self, port: u16, checks: u32) -> &Self {
        self.open_after.lock().unwrap().insert(port, checks);
        self
    }

    pub fn http(&self, url: &str, outcome: HttpOutcome) -> &Self {
        self.http.lock().unwrap().insert(url.to_string(), outcome);
        self
    }

    pub fn port_checks(&self, port: u16) -> u32 {
        self.checks.lock().unwrap().get(&port).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NetProbe for FakeNet {
    async fn port_open(&self, port: u16, _timeout: Duration) -> bool {
        let count = {
            let mut checks = self.checks.lock().unwrap();
            let count = checks.entry(port).or_insert(0);
            *count += 1;
            *count
        };
        match self.open_after.lock().unwrap().get(&port) {
            Some(threshold) => count >= *threshold,
            None => false,
        }
    }

    async fn http_get(&self, url: &str, _timeout: Duration) -> HttpOutcome {
        self.http
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or_else(HttpOutcome::unreachable)
    }
}
