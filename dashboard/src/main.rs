use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod config;

use config::{Config, MetricsConfig};

const METRICS_PREFIX: &str = "dashboard";

#[derive(Parser)]
#[command(name = "dashboard", about = "Operations dashboard gateway")]
enum CliCommand {
    /// Serve the dashboard API and the admin endpoints
    Run {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Print every metric the gateway emits
    ListMetrics,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Validation(#[from] ops_gateway::config::ValidationError),
    #[error("invalid sentry DSN: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] ops_gateway::GatewayError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run { config } => match run(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "dashboard exited");
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
        CliCommand::ListMetrics => {
            for def in ops_gateway::metrics_defs::ALL_METRICS {
                println!(
                    "{}\t{}\t{}",
                    def.name,
                    def.metric_type.as_str(),
                    def.description
                );
            }
            ExitCode::SUCCESS
        }
    }
}

fn run(path: &Path) -> Result<(), CliError> {
    let config = Config::from_file(path)?;

    // Kept alive until exit so buffered events are flushed
    let _sentry = init_logging(config.sentry_dsn())?;
    if let Some(statsd) = &config.common.metrics {
        init_metrics(statsd)?;
    }

    let mut gateway = config.gateway;
    gateway.apply_env_overrides(|var| std::env::var(var).ok())?;

    tracing::info!(config = %path.display(), "starting dashboard gateway");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(ops_gateway::run(gateway))?;
    Ok(())
}

fn init_logging(sentry_dsn: Option<&str>) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let dsn = sentry_dsn.map(str::parse::<sentry::types::Dsn>).transpose()?;
    let guard = dsn.map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    Ok(guard)
}

fn init_metrics(statsd: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(statsd.statsd_host.clone(), statsd.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    tracing::info!(
        host = %statsd.statsd_host,
        port = statsd.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
