//! Observed demo service.
//!
//! A small Axum service wired through the observability facade.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ observe_request ─▶ handler
//!                                     │                  │
//!                                     │ scoped Observance│ logger / metrics
//!                                     ▼                  ▼
//!                              ┌──────────────────────────────────┐
//!                              │ JsonLogger ─▶ stdout (JSON lines) │
//!                              │     └─▶ ErrorReportHook ─▶ collector
//!                              │ PushGatewayReporter ─▶ push gateway
//!                              └──────────────────────────────────┘
//! ```
//!
//! Routes: `/` logs at info, `/fail` logs an error with an attached cause,
//! `/panic` panics inside the handler.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use service_observability::config::{self, ObservanceConfig};
use service_observability::http::HttpServer;
use service_observability::lifecycle::{trigger_on_signal, Shutdown};
use service_observability::observability::Observance;

#[derive(Parser)]
#[command(name = "observed-service")]
#[command(about = "Demo service emitting structured logs, error reports and metrics", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_observability=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config: ObservanceConfig = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::from_env()?,
    };

    tracing::info!(
        app_name = %config.app_name,
        log_level = %config.log_level,
        error_tracking = config.error_tracking.dsn().is_some(),
        metrics = config.metrics.endpoint().is_some(),
        "Configuration loaded"
    );

    let observance = Observance::new(&config)?;
    observance.logger().info("Service starting");

    let server = HttpServer::new(observance.clone(), &config)?;
    let listener = TcpListener::bind(&cli.bind).await?;

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        trigger_on_signal(&signal_shutdown).await;
    });

    server.run(listener, &shutdown).await?;

    shutdown.graceful_flush(&observance, observance.flush_timeout()).await;
    observance.logger().info("Service stopped");

    tracing::info!("Shutdown complete");
    Ok(())
}
