pub mod api;
pub mod config;
pub mod dates;
pub mod errors;
pub mod metrics_defs;
pub mod normalize;
pub mod policy;
pub mod sources;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testutils;

use config::Config;
use policy::DegradePolicies;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use sources::{CronJobSource, CronPerformanceSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use upstream::UpstreamClient;

pub use errors::GatewayError;

/// Shared by every request. Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    /// Same pool as `upstream`, pointed at the BBPS base
    pub bbps: UpstreamClient,
    pub sql_timeout: Duration,
    pub degrade: Arc<DegradePolicies>,
    pub cron_performance: Arc<dyn CronPerformanceSource>,
    pub cron_jobs: Arc<dyn CronJobSource>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let upstream = UpstreamClient::new(
            config.upstream.base_url.clone(),
            config.upstream.token.clone(),
            config.upstream.timeout(),
        );
        let bbps = upstream.rebased(config.upstream.bbps_base_url().clone());

        AppState {
            cron_performance: sources::cron_performance_source(
                config.sources.cron_performance,
                &upstream,
            ),
            cron_jobs: sources::cron_job_source(config.sources.cron_jobs, &upstream),
            sql_timeout: config.upstream.sql_timeout(),
            degrade: Arc::new(config.degrade.clone()),
            upstream,
            bbps,
        }
    }
}

/// Runs the API and admin listeners until either fails.
pub async fn run(config: Config) -> Result<(), GatewayError> {
    config.validate()?;

    let ready = Arc::new(AtomicBool::new(false));
    let admin_service = AdminService::<_, GatewayError>::new({
        let ready = ready.clone();
        move || ready.load(Ordering::Relaxed)
    });

    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );
    let api_task = serve_api(&config, ready);

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

async fn serve_api(config: &Config, ready: Arc<AtomicBool>) -> Result<(), GatewayError> {
    let app = api::router(AppState::from_config(config));

    let (host, port) = (config.listener.host.as_str(), config.listener.port);
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(
        host,
        port,
        upstream = %config.upstream.base_url,
        cron_performance = ?config.sources.cron_performance,
        cron_jobs = ?config.sources.cron_jobs,
        "api listening"
    );

    ready.store(true, Ordering::Relaxed);
    axum::serve(listener, app).await?;
    Ok(())
}
