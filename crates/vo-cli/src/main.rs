mod cli;
mod commands;
mod render;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::eyre;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use vo_core::OpsError;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    match commands::run(cli).await {
        Ok(code) => Ok(code),
        Err(error) => {
            tracing::debug!(?error, "command failed");
            report(&error);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Logs go to stderr; `--log-file` adds a plain-text copy. The returned guard
/// must live until exit so buffered file output is flushed.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> color_eyre::Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| eyre!("--log-file must name a file: {}", path.display()))?;
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

fn report(error: &OpsError) {
    eprintln!("error: {error}");
    if let Some(service) = error.stranded_service() {
        eprintln!("{service} has been left in maintenance mode.");
    }
    let steps = error.remediation();
    if !steps.is_empty() {
        eprintln!("\nNext steps:");
        for step in steps {
            eprintln!("  {step}");
        }
    }
}
