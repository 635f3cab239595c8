use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "caseload", about = "Application intake service")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the intake API.
    Serve,
    /// Parse and validate the config file, then exit.
    CheckConfig,
}

fn init_logging(config: &Config) {
    let filter = config
        .logging
        .as_ref()
        .map(|l| EnvFilter::new(&l.filter))
        .unwrap_or_else(|| EnvFilter::from_default_env());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn init_metrics(config: &Config) {
    let Some(metrics_config) = &config.metrics else {
        return;
    };

    let recorder = StatsdBuilder::from(
        metrics_config.statsd_host.clone(),
        metrics_config.statsd_port,
    )
    .build(Some(&metrics_config.prefix));

    match recorder {
        Ok(recorder) => {
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("metrics recorder was already installed");
            }
            shared::metrics_defs::describe_all(intake_api::metrics_defs::ALL_METRICS);
        }
        Err(err) => tracing::warn!(error = %err, "could not set up statsd exporter"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid config {}: {err}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::CheckConfig => {
            println!("config ok: {}", cli.config.display());
            ExitCode::SUCCESS
        }
        Command::Serve => {
            init_logging(&config);
            init_metrics(&config);

            if let Err(err) = intake_api::run(config.intake).await {
                tracing::error!(error = %err, "service exited with error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
    }
}
