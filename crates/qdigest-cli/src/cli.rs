//! qdigest - samples a monitored MySQL query's execution plan into MongoDB
//!
//! Usage:
//!   qdigest run [--config FILE] [--iterations N] [--query SQL]
//!   qdigest check [--config FILE] [--format table|json]
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables (MYSQL_*, STORE_*, DIGEST_*).

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use qdigest_connection::{Connectivity, SocketState};
use qdigest_core::{DigestConfig, Settings};
use qdigest_services::{Pipeline, PipelineDrivers, RoleHealth};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "qdigest",
    about = "Harvest EXPLAIN plans of a monitored MySQL query into MongoDB",
    version
)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(long, short, global = true, env = "DIGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level with source locations
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write JSON logs under the local data directory
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the store and sample the monitored query
    Run {
        /// Number of samples to take (default: until Ctrl-C)
        #[arg(long, short)]
        iterations: Option<u64>,

        /// Monitored query, overriding DIGEST_QUERY
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Connect once to every role and report its health
    Check {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        logging::LoggingConfig::verbose()
    } else {
        logging::LoggingConfig::default()
    };
    logging::init(logging.with_json_logs(cli.json_logs))?;

    match cli.command {
        Commands::Run { iterations, query } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(n) = iterations {
                config.run.iterations = Some(n);
            }
            if let Some(q) = query {
                config.run.query = Some(q);
            }
            let settings = config.resolve()?;
            cmd_run(&settings).await
        }
        Commands::Check { format } => {
            let settings = load_config(cli.config.as_deref())?.resolve()?;
            cmd_check(&settings, format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DigestConfig> {
    let mut config = match path {
        Some(path) => DigestConfig::from_file(path)?,
        None => DigestConfig::default(),
    };
    config.apply_process_env()?;
    Ok(config)
}

async fn cmd_run(settings: &Settings) -> Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl-C, finishing the current iteration"),
            Err(e) => tracing::warn!(error = %e, "could not listen for Ctrl-C"),
        }
        trigger.cancel();
    });

    tracing::info!(
        query = %settings.query,
        iterations = ?settings.iterations,
        source = %settings.source.endpoint,
        destination = %settings.destination.app_endpoint,
        "starting qdigest"
    );

    let drivers = PipelineDrivers::from_settings(settings);
    let summary = Pipeline::execute(settings, drivers, &cancel)
        .await
        .context("qdigest could not start")?;

    println!(
        "{} sample(s) written, {} sampling failure(s), {} write failure(s)",
        summary.written, summary.sampling_failures, summary.write_failures
    );
    Ok(())
}

async fn cmd_check(settings: &Settings, format: OutputFormat) -> Result<()> {
    let report = Pipeline::check(settings, PipelineDrivers::from_settings(settings)).await;

    match format {
        OutputFormat::Table => println!("{}", health_table(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let closed: Vec<&str> = report
        .iter()
        .filter(|r| r.status.connectivity == Connectivity::Closed)
        .map(|r| r.role)
        .collect();
    if !closed.is_empty() {
        anyhow::bail!("unreachable: {}", closed.join(", "));
    }
    Ok(())
}

fn health_table(report: &[RoleHealth]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Role", "Driver", "Endpoint", "Port", "State", "Socket", "Errors"]);

    for entry in report {
        let status = &entry.status;
        let state = match status.connectivity {
            Connectivity::Open if status.is_degraded() => Cell::new("open (degraded)").fg(Color::Yellow),
            Connectivity::Open => Cell::new("open").fg(Color::Green),
            Connectivity::Closed => Cell::new("closed").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(entry.role),
            Cell::new(entry.driver),
            Cell::new(&status.endpoint),
            Cell::new(status.port),
            state,
            Cell::new(socket_label(&status.socket)),
            Cell::new(status.errors.join("\n")),
        ]);
    }
    table
}

fn socket_label(socket: &SocketState) -> String {
    match socket {
        SocketState::NotConfigured => "-".to_string(),
        SocketState::Found(path) => path.display().to_string(),
        SocketState::Missing { path, .. } => format!("{} (missing)", path.display()),
    }
}
