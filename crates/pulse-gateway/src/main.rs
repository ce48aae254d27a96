use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use pulse_core::config::{HistoryBackend, PulseConfig};
use pulse_registry::KeyRegistry;
use pulse_scheduler::{
    ChatAnalyzer, HistoryStore, MemoryHistory, PulseScheduler, SchedulerSettings, SqliteHistory,
    SyntheticFeed,
};
use tracing::{info, warn};

mod app;
mod auth;
mod error;
mod http;

#[derive(Parser, Debug)]
#[command(name = "pulse-gateway", about = "PulseTrade HTTP gateway")]
struct Args {
    /// Path to config file (default: $PULSE_CONFIG, then ~/.pulsetrade/pulsetrade.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_gateway=info,tower_http=debug".into()),
        )
        .init();

    // config: --config > PULSE_CONFIG env > ~/.pulsetrade/pulsetrade.toml
    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("PULSE_CONFIG").ok());
    let config = PulseConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        PulseConfig::default()
    });

    let history = build_history(&config)?;
    let scheduler = PulseScheduler::new(
        SchedulerSettings::from(&config.scheduler),
        Arc::new(SyntheticFeed::new(config.analysis.provider.clone())),
        Arc::new(ChatAnalyzer::new(config.analysis.endpoint.clone())),
        history,
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, KeyRegistry::new(), scheduler.clone()));
    let router = app::build_router(state);

    info!("PulseTrade gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stopped = scheduler.shutdown();
    info!(stopped, "gateway stopped");
    Ok(())
}

fn build_history(config: &PulseConfig) -> anyhow::Result<Arc<dyn HistoryStore>> {
    match config.history.backend {
        HistoryBackend::Memory => Ok(Arc::new(MemoryHistory::new())),
        HistoryBackend::Sqlite => {
            let path = &config.history.path;
            ensure_parent_dir(path);
            info!(path = %path, "opening SQLite history");
            Ok(Arc::new(SqliteHistory::open(path)?))
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
