//! jobscaled — the jobscale daemon.
//!
//! Single binary that assembles the autoscaler:
//! - Queue depth source (Postgres)
//! - Rate-limit coordinator (Redis)
//! - Fleet controller (HTTP)
//! - Autoscaler loop
//! - Status server (`/health`, `/metrics`)
//!
//! # Usage
//!
//! ```text
//! JOBSCALE_SERVICE_REF=workers \
//! JOBSCALE_FLEET_API_URL=http://fleet.internal:9000/v1 \
//! JOBSCALE_FLEET_API_TOKEN=... \
//! JOBSCALE_QUEUE_STORE_URL=postgres://jobs@db/jobs \
//! JOBSCALE_RATE_LIMIT_STORE_URL=redis://cache:6379 \
//! JOBSCALE_RATE_LIMIT_CAP=20 \
//! jobscaled
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser};
use tokio::sync::watch;
use tracing::{error, info};

use jobscale_autoscale::AutoscalerLoop;
use jobscale_core::{Config, ConfigError, parse_scale_steps};
use jobscale_fleet::HttpFleetController;
use jobscale_queue::PgQueueDepth;
use jobscale_ratelimit::RedisWindow;

#[derive(Parser)]
#[command(name = "jobscaled", about = "Queue-driven worker fleet autoscaler")]
struct Cli {
    /// Load settings from a TOML file instead of flags and environment.
    #[arg(long, env = "JOBSCALE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "JOBSCALE_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args)]
struct Settings {
    /// Worker service identifier on the fleet platform.
    #[arg(long, env = "JOBSCALE_SERVICE_REF")]
    service_ref: Option<String>,

    #[arg(long, env = "JOBSCALE_FLEET_API_URL")]
    fleet_api_url: Option<String>,

    #[arg(long, env = "JOBSCALE_FLEET_API_TOKEN", hide_env_values = true)]
    fleet_api_token: Option<String>,

    #[arg(long, env = "JOBSCALE_QUEUE_STORE_URL", hide_env_values = true)]
    queue_store_url: Option<String>,

    /// Job table to count pending/running rows in.
    #[arg(long, env = "JOBSCALE_QUEUE_TABLE", default_value = "jobs")]
    queue_table: String,

    #[arg(long, env = "JOBSCALE_RATE_LIMIT_STORE_URL", hide_env_values = true)]
    rate_limit_store_url: Option<String>,

    /// Units allowed per window across every process sharing the key.
    #[arg(long, env = "JOBSCALE_RATE_LIMIT_CAP")]
    rate_limit_cap: Option<u64>,

    #[arg(long, env = "JOBSCALE_RATE_LIMIT_WINDOW_MS", default_value = "60000")]
    rate_limit_window_ms: u64,

    #[arg(long, env = "JOBSCALE_RATE_LIMIT_KEY", default_value = "jobscale:fleet-actions")]
    rate_limit_key: String,

    #[arg(long, env = "JOBSCALE_MIN_REPLICAS", default_value = "0")]
    min_replicas: u32,

    #[arg(long, env = "JOBSCALE_MAX_REPLICAS", default_value = "5")]
    max_replicas: u32,

    #[arg(long, env = "JOBSCALE_POLL_INTERVAL_MS", default_value = "10000")]
    poll_interval_ms: u64,

    #[arg(long, env = "JOBSCALE_SCALE_UP_COOLDOWN_MS", default_value = "30000")]
    scale_up_cooldown_ms: u64,

    #[arg(long, env = "JOBSCALE_SCALE_DOWN_COOLDOWN_MS", default_value = "120000")]
    scale_down_cooldown_ms: u64,

    /// Upper bound on each queue, rate-limit, and fleet call.
    #[arg(long, env = "JOBSCALE_CALL_TIMEOUT_MS", default_value = "5000")]
    call_timeout_ms: u64,

    /// Step breakpoints as `max_pending:replicas`, comma separated.
    #[arg(long, env = "JOBSCALE_SCALE_STEPS", default_value = "0:0,10:1,30:2,60:3,100:4")]
    scale_steps: String,

    #[arg(long, env = "JOBSCALE_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,
}

impl Settings {
    fn into_config(self) -> Result<Config, ConfigError> {
        let config = Config {
            service_ref: self
                .service_ref
                .ok_or(ConfigError::Missing("JOBSCALE_SERVICE_REF"))?,
            fleet_api_url: self
                .fleet_api_url
                .ok_or(ConfigError::Missing("JOBSCALE_FLEET_API_URL"))?,
            fleet_api_token: self
                .fleet_api_token
                .ok_or(ConfigError::Missing("JOBSCALE_FLEET_API_TOKEN"))?,
            queue_store_url: self
                .queue_store_url
                .ok_or(ConfigError::Missing("JOBSCALE_QUEUE_STORE_URL"))?,
            queue_table: self.queue_table,
            rate_limit_store_url: self
                .rate_limit_store_url
                .ok_or(ConfigError::Missing("JOBSCALE_RATE_LIMIT_STORE_URL"))?,
            global_rate_limit_cap: self
                .rate_limit_cap
                .ok_or(ConfigError::Missing("JOBSCALE_RATE_LIMIT_CAP"))?,
            rate_limit_window_ms: self.rate_limit_window_ms,
            rate_limit_key: self.rate_limit_key,
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            poll_interval_ms: self.poll_interval_ms,
            scale_up_cooldown_ms: self.scale_up_cooldown_ms,
            scale_down_cooldown_ms: self.scale_down_cooldown_ms,
            call_timeout_ms: self.call_timeout_ms,
            scale_steps: parse_scale_steps(&self.scale_steps)?,
            listen_addr: self.listen_addr,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Cli {
    fn load_config(self) -> Result<Config, ConfigError> {
        match self.config {
            Some(path) => Config::from_file(&path),
            None => self.settings.into_config(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,jobscale=debug"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Configuration problems end the process here, before anything binds.
    let config = cli.load_config().context("invalid configuration")?;
    run(config).await
}

/// Wire the production collaborators into an autoscaler loop.
fn build_autoscaler(config: Config) -> anyhow::Result<AutoscalerLoop> {
    let queue = PgQueueDepth::connect_lazy(
        &config.queue_store_url,
        &config.queue_table,
        config.call_timeout(),
    )
    .context("queue store")?;

    let limiter = RedisWindow::new(
        &config.rate_limit_store_url,
        &config.rate_limit_key,
        config.global_rate_limit_cap,
        config.rate_limit_window(),
    )
    .context("rate-limit store")?;

    let fleet = HttpFleetController::new(
        &config.fleet_api_url,
        &config.fleet_api_token,
        config.call_timeout(),
    )
    .context("fleet controller")?;

    Ok(AutoscalerLoop::new(
        config,
        Arc::new(queue),
        Arc::new(limiter),
        Arc::new(fleet),
    ))
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        service = %config.service_ref,
        min = config.min_replicas,
        max = config.max_replicas,
        "jobscale daemon starting"
    );

    let addr: SocketAddr = config.listen_addr.parse().context("listen address")?;
    let mut autoscaler = build_autoscaler(config)?;
    let router = jobscale_api::build_router(autoscaler.status());

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Status server ──────────────────────────────────────────

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "status server listening");

    // ── Autoscaler loop ────────────────────────────────────────

    let autoscale_handle = tokio::spawn(async move {
        autoscaler.run(shutdown_rx).await;
    });

    let server_shutdown = shutdown_tx.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = server_shutdown.send(true);
        })
        .await;

    // Also stop the loop if the server died on its own.
    let _ = shutdown_tx.send(true);
    if let Err(e) = autoscale_handle.await {
        error!(error = %e, "autoscaler task failed");
    }

    served?;
    info!("jobscale daemon stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jobscaled").chain(args.iter().copied())).unwrap()
    }

    const REQUIRED: &[&str] = &[
        "--service-ref",
        "workers",
        "--fleet-api-url",
        "http://fleet:9000",
        "--fleet-api-token",
        "t",
        "--queue-store-url",
        "postgres://db/jobs",
        "--rate-limit-store-url",
        "redis://cache",
        "--rate-limit-cap",
        "20",
    ];

    #[test]
    fn flags_build_a_valid_config_with_defaults() {
        let config = parse(REQUIRED).load_config().unwrap();
        assert_eq!(config.service_ref, "workers");
        assert_eq!(config.max_replicas, 5);
        assert_eq!(config.min_replicas, 0);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.scale_up_cooldown_ms, 30_000);
        assert_eq!(config.scale_down_cooldown_ms, 120_000);
        assert_eq!(config.scale_steps.len(), 5);
    }

    #[test]
    fn missing_required_setting_is_reported_by_name() {
        let err = parse(&REQUIRED[2..]).load_config().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JOBSCALE_SERVICE_REF")));
    }

    #[test]
    fn invalid_bounds_fail_validation() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--min-replicas", "4", "--max-replicas", "2"]);
        assert!(parse(&args).load_config().is_err());
    }

    #[tokio::test]
    async fn production_wiring_needs_no_live_stores() {
        let config = parse(REQUIRED).load_config().unwrap();
        let autoscaler = build_autoscaler(config).unwrap();
        assert_eq!(autoscaler.state().ticks, 0);
    }
}
