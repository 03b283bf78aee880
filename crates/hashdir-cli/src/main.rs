mod commands;
mod logging;
mod output;
mod progress;

use std::process;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use commands::{Cli, Commands};
use dotenv::dotenv;
use hashdir_core::{AppConfig, ReportOptions, ScanEngine};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match hashdir_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    if let Err(err) = run(args, config) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run(args: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    if let Some(db) = args.db {
        config.db_path = db;
    }

    match args.command {
        Some(Commands::Scan { root, workers }) => {
            if workers.is_some() {
                config.workers = workers;
            }
            run_scan(config, &root)?;
        }
        Some(Commands::Prune) => {
            let engine = ScanEngine::new(config);
            info!("Pruning {}", engine.db_path());
            let summary = engine.prune(&CliReporter::new())?;
            output::print_prune_summary(&summary);
        }
        Some(Commands::Report { top, groups, json }) => {
            let mut options = ReportOptions::from(&config);
            if let Some(top) = top {
                options.top_k = top;
            }
            options.max_groups = groups;

            let report = ScanEngine::new(config).report(&options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_report(&report);
            }
        }
        Some(Commands::Lookup { hash }) => {
            let records = ScanEngine::new(config).lookup(&hash)?;
            if records.is_empty() {
                warn!("No files with hash {}", hash);
            }
            output::print_records(&records);
        }
        Some(Commands::Sessions { limit }) => {
            let sessions = ScanEngine::new(config).sessions(limit)?;
            output::print_sessions(&sessions);
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_scan(config: AppConfig, root: &std::path::Path) -> anyhow::Result<()> {
    let engine = ScanEngine::new(config);
    info!("Indexing {} into {}", root.display(), engine.db_path());

    let cancel = engine.cancel_token();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, stopping scan...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl+C handler")?;

    let reporter = CliReporter::new();
    let summary = engine
        .scan(root, &reporter)
        .with_context(|| format!("scanning {}", root.display()))?;
    drop(reporter);

    println!();
    output::print_scan_summary(&summary);
    Ok(())
}
