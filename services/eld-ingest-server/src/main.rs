//! ELD event ingestion server.
//!
//! Terminates HTTP, wires the ingestion pipeline to Postgres and Redis,
//! and exposes the API surface defined in `eld_api`. Bootstrap order:
//! parse CLI, load layered config, connect backing stores, build the
//! router, serve with graceful shutdown.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eld_api::state::AppState;
use eld_db::Database;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "eld-ingest-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML, JSON, or YAML).
    #[arg(short, long, env = "ELD_INGEST_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "ELD_INGEST_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "ELD_INGEST_PORT")]
    port: Option<u16>,

    #[arg(long, env = "ELD_INGEST_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "ELD_INGEST_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Run pending Postgres migrations before serving.
    #[arg(long, env = "ELD_INGEST_MIGRATE")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(db_url) = args.database_url {
        server_config.database.postgres_url = db_url;
    }
    if let Some(redis_url) = args.redis_url {
        server_config.database.redis_url = redis_url;
    }
    server_config.logging.level = args.log_level;
    server_config.logging.format = args.log_format;

    init_logging(&server_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting eld-ingest-server");

    let db = init_database(&server_config.database, args.migrate).await?;

    if server_config.metrics.enabled {
        start_metrics_server(server_config.metrics.port)?;
    }

    let state = Arc::new(AppState::new(db, server_config.ingest.clone()));
    let app = eld_api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = server_config.server.socket_addr();
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().pretty().with_target(true)).init(),
    }

    Ok(())
}

async fn init_database(config: &eld_db::DatabaseConfig, migrate: bool) -> anyhow::Result<Arc<Database>> {
    tracing::info!(
        postgres = %config.postgres_url_masked(),
        redis = %config.redis_url_masked(),
        "connecting to backing stores"
    );

    let db = Database::connect(config).await?;

    if migrate {
        tracing::info!("running pending migrations");
        db.migrate().await?;
    }

    let health = db.health_check().await;
    if !health.healthy {
        anyhow::bail!("database health check failed on startup");
    }
    tracing::info!(postgres = health.postgres, redis = health.redis, "backing stores healthy");

    Ok(Arc::new(db))
}

fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(port, "starting metrics server");

    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?;

    tokio::spawn(async move {
        let _handle = handle;
        std::future::pending::<()>().await;
    });

    Ok(())
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }

    tracing::info!(timeout_secs = timeout.as_secs(), "waiting for in-flight requests");
    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_port_override() {
        let args = Args::parse_from(["eld-ingest-server", "--port", "9000"]);
        assert_eq!(args.port, Some(9000));
    }
}
