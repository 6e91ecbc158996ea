//! Image-job dispatch gateway server
//!
//! Entry point wiring configuration, the upstream engine, the job registry
//! and HTTP server startup with a bounded graceful shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use imgjobs_auth::ClaimsVerifier;
use imgjobs_config::EngineKind;
use imgjobs_dispatcher::state::AppState;
use imgjobs_engine::{Backoff, Engine, RemoteEngine, RetryPolicy};
use imgjobs_registry::JobRegistry;

mod cli;
mod tracing_setup;

use cli::CliArgs;
use tracing_setup::install_tracing;

/// How long in-flight requests may keep running once shutdown begins.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] Dispatch gateway starting...");
    let args = CliArgs::parse();

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .clone()
        .or_else(|| std::env::var("IMGJOBS_CONFIG_PATH").ok());

    eprintln!("[STARTUP] Loading config from: {:?}", config_path);
    let mut config = load_config(config_path.as_deref())?;
    args.apply(&mut config);
    imgjobs_config::validate_config(&config)?;
    eprintln!("[STARTUP] Config loaded successfully");

    eprintln!("[STARTUP] Initializing tracing...");
    install_tracing(&config.logging);
    eprintln!("[STARTUP] Tracing initialized");

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        engine_kind = %config.engine.kind,
        worker_api_url = %config.engine.worker_api_url,
        retry_max_attempts = config.retry.max_attempts,
        retry_backoff = %config.retry.backoff,
        "dispatch gateway configuration"
    );

    eprintln!("[STARTUP] Building upstream engine...");
    let engine = build_engine(&config)?;
    eprintln!("[STARTUP] Upstream engine ready");

    // Seeded registry mirrors the demo deployment's store
    let registry = JobRegistry::seeded();
    let verifier = ClaimsVerifier::new_hs256(config.auth.jwt_secret.clone())
        .with_leeway(config.auth.jwt_leeway_seconds);
    let state = Arc::new(AppState::new(registry, engine, verifier));
    eprintln!("[STARTUP] AppState created");

    let app = imgjobs_dispatcher::build_router(state);
    eprintln!("[STARTUP] Router built successfully");

    eprintln!(
        "[STARTUP] Binding to {}:{}",
        config.server.host, config.server.port
    );
    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    eprintln!(
        "[STARTUP] ✓ Server listening on {}:{}",
        config.server.host, config.server.port
    );
    eprintln!("[STARTUP] ✓ Ready to accept connections!");

    serve_until_shutdown(listener, app).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: Option<&str>) -> Result<imgjobs_config::Config, imgjobs_config::ConfigError> {
    match path {
        Some(p) => imgjobs_config::load_config(Some(p)),
        None => imgjobs_config::load_config::<&std::path::Path>(None),
    }
}

/// Construct the upstream engine named by the configuration.
fn build_engine(cfg: &imgjobs_config::Config) -> anyhow::Result<Arc<dyn Engine>> {
    match cfg.engine.kind()? {
        EngineKind::RemoteRest => {
            let policy = retry_policy(&cfg.retry)?;
            let engine = RemoteEngine::new(cfg.engine.worker_api_url.clone(), policy);
            Ok(Arc::new(engine))
        }
    }
}

/// Translate the retry section into an engine policy.
fn retry_policy(cfg: &imgjobs_config::RetryConfig) -> anyhow::Result<RetryPolicy> {
    let backoff = cfg
        .backoff
        .parse::<Backoff>()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(RetryPolicy {
        max_attempts: cfg.max_attempts,
        delay: Duration::from_millis(cfg.delay_ms),
        backoff,
        attempt_timeout: Duration::from_millis(cfg.attempt_timeout_ms),
        total_timeout: Duration::from_millis(cfg.total_timeout_ms),
    })
}

/// Parse host and port into a bind address, falling back to all interfaces.
fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
    }
}

/// Serve until ctrl-c, then give in-flight requests a bounded grace period.
async fn serve_until_shutdown(listener: TcpListener, app: axum::Router) -> anyhow::Result<()> {
    let (grace_tx, grace_rx) = tokio::sync::oneshot::channel::<()>();

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace_tx));

    tokio::select! {
        res = server => res?,
        _ = grace_period(grace_rx) => {
            tracing::warn!("grace period elapsed, closing remaining connections");
        }
    }
    Ok(())
}

/// Resolves when the process receives ctrl-c; also starts the grace clock.
async fn shutdown_signal(grace_tx: tokio::sync::oneshot::Sender<()>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(%e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
    let _ = grace_tx.send(());
}

async fn grace_period(grace_rx: tokio::sync::oneshot::Receiver<()>) {
    let _ = grace_rx.await;
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
