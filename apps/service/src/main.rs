use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::debug;

use logger::{LevelFilter, init_tracing};
use watchdog_service::config::Config;
use watchdog_service::database::models::MonitoredTarget;
use watchdog_service::orchestrator::TargetHistory;
use watchdog_service::Watchdog;

mod cli;

use cli::{AddTargetArgs, Cli, Commands, TargetCommand, UpdateTargetArgs};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });

    let config = Config::load(cli.config.as_ref())?;
    debug!("Loaded configuration:\n{config}");

    if let Commands::Config = cli.command {
        if cli.json {
            print_json(&config)?;
        } else {
            print!("{config}");
        }
        return Ok(());
    }

    let watchdog = Watchdog::open(config).await?;
    run(&cli, &watchdog).await
}

async fn run(cli: &Cli, watchdog: &Watchdog) -> Result<()> {
    match &cli.command {
        Commands::Run => watchdog.run().await?,

        Commands::Check { id } => {
            let result = watchdog.check_now(*id).await?;
            if cli.json {
                print_json(&result)?;
            } else {
                let latency = result
                    .latency_seconds
                    .map(|s| format!("{:.3}s", s))
                    .unwrap_or_else(|| "-".into());
                println!("{} {} ({latency})", result.checked_at.format("%Y-%m-%d %H:%M:%S"), result.status);
                if let Some(error) = &result.error_message {
                    println!("  {error}");
                }
            }
        }

        Commands::Target(command) => run_target(cli, watchdog, command).await?,

        Commands::History { id, hours, limit } => {
            let history = watchdog.history(*id, *hours, *limit).await?;
            if cli.json {
                print_json(&history)?;
            } else {
                print_history(&history, *hours);
            }
        }

        Commands::Notifications { id, limit } => {
            let records = watchdog.notifications(*id, *limit).await?;
            if cli.json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("No notifications");
            } else {
                for record in records {
                    let outcome = if record.success {
                        "sent".to_string()
                    } else {
                        format!("failed: {}", record.error_message.unwrap_or_default())
                    };
                    println!(
                        "{} {:<8} {} via {} -> {} ({outcome})",
                        record.sent_at.format("%Y-%m-%d %H:%M:%S"),
                        record.kind,
                        record.subject,
                        record.channel,
                        record.recipient,
                    );
                }
            }
        }

        // Handled before the database is opened
        Commands::Config => {}
    }

    Ok(())
}

async fn run_target(cli: &Cli, watchdog: &Watchdog, command: &TargetCommand) -> Result<()> {
    match command {
        TargetCommand::Add(args) => {
            let target = new_target(args, watchdog.config().monitoring.default_interval_seconds);
            let target = watchdog.register_target(target).await?;
            print_target_or_json(cli, &target)?;
        }

        TargetCommand::Update(args) => {
            let mut target = watchdog.get_target(args.id).await?;
            apply_update(&mut target, args);
            let target = watchdog.update_target(target).await?;
            print_target_or_json(cli, &target)?;
        }

        TargetCommand::Remove { id, keep_history } => {
            let removed = watchdog.remove_target(*id, !keep_history).await?;
            if cli.json {
                print_json(&serde_json::json!({ "id": id, "removed": removed }))?;
            } else if removed {
                println!("Removed target {id}");
            } else {
                println!("Target {id} not found");
            }
        }

        TargetCommand::List => {
            let targets = watchdog.list_targets().await?;
            if cli.json {
                print_json(&targets)?;
            } else if targets.is_empty() {
                println!("No targets");
            } else {
                for target in &targets {
                    print_target(target);
                }
            }
        }
    }

    Ok(())
}

fn new_target(args: &AddTargetArgs, default_interval: u64) -> MonitoredTarget {
    MonitoredTarget {
        description: args.description.clone(),
        http_path: args.path.clone(),
        ..MonitoredTarget::new(&args.name, &args.host, args.port, &args.check_type, &args.recipient)
            .with_interval(args.interval.unwrap_or(default_interval))
    }
}

fn apply_update(target: &mut MonitoredTarget, args: &UpdateTargetArgs) {
    if let Some(name) = &args.name {
        target.name = name.clone();
    }
    if let Some(host) = &args.host {
        target.host = host.clone();
    }
    if let Some(port) = args.port {
        target.port = port;
    }
    if let Some(check_type) = &args.check_type {
        target.check_type = check_type.clone();
    }
    if let Some(interval) = args.interval {
        target.interval_seconds = interval;
    }
    if let Some(recipient) = &args.recipient {
        target.recipient = recipient.clone();
    }
    // Empty strings clear optional fields
    if let Some(description) = &args.description {
        target.description = (!description.is_empty()).then(|| description.clone());
    }
    if let Some(path) = &args.path {
        target.http_path = (!path.is_empty()).then(|| path.clone());
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_target_or_json(cli: &Cli, target: &MonitoredTarget) -> Result<()> {
    if cli.json {
        print_json(target)
    } else {
        print_target(target);
        Ok(())
    }
}

fn print_target(target: &MonitoredTarget) {
    let id = target.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
    println!(
        "[{id}] {} {}://{} every {}s -> {}",
        target.name,
        target.check_type,
        target.address(),
        target.interval_seconds,
        target.recipient
    );
    if let Some(description) = &target.description {
        println!("    {description}");
    }
}

fn print_history(history: &TargetHistory, hours: u32) {
    let summary = &history.summary;
    print_target(&history.target);
    println!(
        "Last {hours}h: {:.2}% up ({}/{} checks), latest {}",
        summary.uptime_percentage, summary.up_checks, summary.total_checks, summary.latest_status
    );
    if let Some(latency) = summary.average_latency_seconds {
        println!("Average latency: {:.3}s", latency);
    }

    for result in &history.results {
        let latency = result
            .latency_seconds
            .map(|s| format!("{:.3}s", s))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {} {:<7} {:>8} {}",
            result.checked_at.format("%Y-%m-%d %H:%M:%S"),
            result.status,
            latency,
            result.error_message.as_deref().unwrap_or("")
        );
    }
}
