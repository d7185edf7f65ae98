use std::process::ExitCode;
use std::sync::Arc;

use vo_core::models::{merge, Health, ServiceStructure, ToolkitConfig};
use vo_core::services::deploy::{DeployOptions, Deployer};
use vo_core::services::host::Host;
use vo_core::services::net::LiveNet;
use vo_core::services::prober::StatusProber;
use vo_core::services::proxy::{ApplyOutcome, ProxyConfigurator};
use vo_core::services::registry::{check_new_service, Registry};
use vo_core::services::runner::{CommandRunner, SystemRunner};
use vo_core::services::{config_loader, maintenance};
use vo_core::{OpsError, Result};

use crate::cli::{Cli, Command, DeployArgs, ProxyAction, ProxyArgs, StatusArgs};
use crate::render;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = config_loader::load(cli.config.as_deref())?;
    tracing::debug!(structure = %config.structure_path.display(), "loaded toolkit config");
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    match cli.command {
        Command::Proxy(args) => proxy(&config, runner, args).await,
        Command::Deploy(args) => deploy(config, runner, args).await,
        Command::Status(args) => status(config, runner, args).await,
    }
}

async fn proxy(
    config: &ToolkitConfig,
    runner: Arc<dyn CommandRunner>,
    args: ProxyArgs,
) -> Result<ExitCode> {
    let host = Host::new(config.elevate.clone());
    let registry = Registry::new(
        config.structure_path.clone(),
        config.state_path.clone(),
        host.clone(),
        runner.clone(),
    );
    let proxy = ProxyConfigurator::new(config, host, runner);
    let dry_run = args.dry_run;

    let outcome = match args.action {
        None => proxy.apply(&registry.load().await?, dry_run).await?,
        Some(ProxyAction::List) => {
            print!("{}", render::service_list(&registry.load().await?));
            return Ok(ExitCode::SUCCESS);
        }
        Some(ProxyAction::Add {
            name,
            port,
            no_strip,
            description,
            health_path,
            unit,
            user,
        }) => {
            let mut entry = ServiceStructure::new(port);
            entry.strip_path = !no_strip;
            entry.description = description;
            entry.health_check_path = health_path;
            entry.unit = unit;
            entry.user = user;

            if dry_run {
                let mut structure = registry.load_structure().await?;
                check_new_service(&structure, &name, &entry)?;
                structure.insert(name.clone(), entry);
                let services = merge(&structure, &registry.load_state().await?);
                proxy.apply(&services, true).await?
            } else {
                registry.add(&name, entry).await?;
                println!("added {name} on port {port}");
                proxy.apply(&registry.load().await?, false).await?
            }
        }
        Some(ProxyAction::Remove { name }) => {
            if dry_run {
                let mut services = registry.load().await?;
                services
                    .remove(&name)
                    .ok_or_else(|| OpsError::NotFound(name.clone()))?;
                proxy.apply(&services, true).await?
            } else {
                registry.remove(&name).await?;
                println!("removed {name}");
                proxy.apply(&registry.load().await?, false).await?
            }
        }
        Some(ProxyAction::Maint { name }) => {
            let (live, outcome) = maintenance::toggle(&registry, &proxy, &name, dry_run).await?;
            let state = if live { "live" } else { "in maintenance" };
            if dry_run {
                println!("{name} would be {state}");
            } else {
                println!("{name} is now {state}");
            }
            outcome
        }
    };

    report_apply(config, &outcome)?;
    Ok(ExitCode::SUCCESS)
}

fn report_apply(config: &ToolkitConfig, outcome: &ApplyOutcome) -> Result<()> {
    if !outcome.written {
        print!("{}", outcome.caddyfile);
        return Ok(());
    }
    println!("wrote {}", config.caddyfile_path.display());
    outcome.check_reload()?;
    println!("proxy reloaded");
    Ok(())
}

async fn deploy(
    config: ToolkitConfig,
    runner: Arc<dyn CommandRunner>,
    args: DeployArgs,
) -> Result<ExitCode> {
    let net = Arc::new(LiveNet::new()?);
    let deployer = Deployer::new(config, runner, net);

    if args.status {
        let status = deployer.status(&args.name).await?;
        print!("{}", render::deploy_status(&status));
        return Ok(ExitCode::SUCCESS);
    }

    let options = DeployOptions {
        health_check: args.health_check,
    };
    let (report, action) = if args.rollback {
        (deployer.rollback(&args.name, &options).await?, "rolled back")
    } else {
        (deployer.deploy(&args.name, &options).await?, "deployed")
    };
    tracing::debug!(stages = ?report.stages, "deploy finished");
    print!("{}", render::deploy_report(&report, action));
    Ok(ExitCode::SUCCESS)
}

async fn status(
    config: ToolkitConfig,
    runner: Arc<dyn CommandRunner>,
    args: StatusArgs,
) -> Result<ExitCode> {
    let host = Host::new(config.elevate.clone());
    let registry = Registry::new(
        config.structure_path.clone(),
        config.state_path.clone(),
        host,
        runner.clone(),
    );
    let services = registry.load().await?;
    let prober = StatusProber::new(config, runner, Arc::new(LiveNet::new()?));

    let statuses = match &args.name {
        Some(name) => {
            let service = services
                .get(name)
                .ok_or_else(|| OpsError::NotFound(name.clone()))?;
            vec![prober.probe(service).await]
        }
        None => prober.probe_all(&services).await,
    };

    match (&args.name, args.json) {
        (Some(_), true) => println!(
            "{}",
            serde_json::to_string_pretty(&render::status_record(&statuses[0])?)?
        ),
        (None, true) => println!(
            "{}",
            serde_json::to_string_pretty(&render::status_records(&statuses)?)?
        ),
        (Some(_), false) => print!("{}", render::status_detail(&statuses[0])),
        (None, false) => print!("{}", render::status_table(&statuses)),
    }

    let any_issue = statuses.iter().any(|s| s.health() == Health::Issue);
    Ok(if any_issue {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
