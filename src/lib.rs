pub mod config;
pub mod cycles;
pub mod db;
pub mod error;
pub mod monitor;
pub mod render;
pub mod report;
mod utils;

use std::{env, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use getopts::Options;
use log::{error, info};

use config::{MonitorConfig, MonitorSettings};
use db::Database;
use error::ConfigError;
use monitor::MonitorController;
use render::ConsoleRenderer;
use report::OutboxReportGenerator;

const DEFAULT_CONFIG_PATH: &str = "screwwatch.json";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub config_path: PathBuf,
    pub database_path: Option<PathBuf>,
    pub outbox_dir: Option<PathBuf>,
    pub init_config: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Help(String),
    Run(CliOptions),
}

fn cli_options() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "c",
        "config",
        &format!("Monitor config file (default {DEFAULT_CONFIG_PATH})"),
        "path",
    );
    opts.optopt("d", "db", "Screw results database", "path");
    opts.optopt("o", "outbox", "Directory cycle reports are written to", "dir");
    opts.optflag(
        "",
        "init-config",
        "Write the effective configuration to the config file and exit",
    );
    opts.optflag("h", "help", "Print this help");
    opts
}

pub fn parse_args(args: &[String]) -> Result<CliCommand> {
    let opts = cli_options();
    let program = args.first().map(String::as_str).unwrap_or("screwwatch");
    let matches = opts
        .parse(args.iter().skip(1))
        .context("invalid command line")?;

    if matches.opt_present("h") {
        let brief = format!("Usage: {program} [-c path] [-d path] [-o dir] [--init-config]");
        return Ok(CliCommand::Help(opts.usage(&brief)));
    }

    Ok(CliCommand::Run(CliOptions {
        config_path: matches
            .opt_str("c")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        database_path: matches.opt_str("d").map(PathBuf::from),
        outbox_dir: matches.opt_str("o").map(PathBuf::from),
        init_config: matches.opt_present("init-config"),
    }))
}

/// File, then environment, then command line; validated last.
pub fn load_config(cli: &CliOptions) -> Result<(MonitorConfig, MonitorSettings), ConfigError> {
    let mut config = MonitorConfig::load(&cli.config_path)?;
    config.apply_env_overrides()?;
    if let Some(path) = &cli.database_path {
        config.database_path = path.clone();
    }
    if let Some(dir) = &cli.outbox_dir {
        config.outbox_dir = dir.clone();
    }
    let settings = config.validate()?;
    Ok((config, settings))
}

fn debug_requested() -> bool {
    env::var("SCREWWATCH_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn run() -> ExitCode {
    let level = if debug_requested() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().collect();
    let cli = match parse_args(&args) {
        Ok(CliCommand::Run(cli)) => cli,
        Ok(CliCommand::Help(usage)) => {
            println!("{usage}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            eprintln!("{}", cli_options().usage("Usage: screwwatch [options]"));
            return ExitCode::FAILURE;
        }
    };

    match launch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn launch(cli: CliOptions) -> Result<()> {
    let (config, settings) = load_config(&cli).context("configuration rejected")?;

    if cli.init_config {
        config.persist(&cli.config_path)?;
        info!("Configuration written to {}", cli.config_path.display());
        return Ok(());
    }

    info!("screwwatch starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(config, settings))
}

async fn serve(config: MonitorConfig, settings: MonitorSettings) -> Result<()> {
    let database = Database::new(config.database_path.clone())?;
    let outbox = OutboxReportGenerator::new(config.outbox_dir.clone(), config.station.clone())?;
    info!(
        "Watching {} in cycles of {}, reports go to {}",
        database.path().display(),
        settings.cycle_size,
        outbox.dir().display()
    );

    let controller = MonitorController::new(settings, database, outbox, ConsoleRenderer::new());
    controller.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    controller.stop().await?;
    let snapshot = controller.snapshot().await;
    info!(
        "Session ended with {} records, {} cycles reported",
        snapshot.record_count,
        snapshot.reported_cycles.len()
    );
    Ok(())
}
