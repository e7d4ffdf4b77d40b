/**
 * STAT MONITOR - Point d'entrée du moniteur de télémétrie STAT
 *
 * RÔLE : Orchestration : config, transport MQTT, ingestion, dispatcher 1 Hz, API HTTP.
 *
 * ARCHITECTURE : deux contextes indépendants autour d'un store par source.
 * - ingestion : MQTT => décodage => classification => fusion
 * - dispatcher : snapshot => schéma => formatage => sink (DisplayBoard)
 */

mod classify;
mod config;
mod connection;
mod decoder;
mod dispatcher;
mod display;
mod format;
mod http;
mod ingest;
mod models;
mod mqtt;
mod schema;
mod sink;
mod state;

use crate::config::{config_path, load_config, Cli, MonitorConfig, CONFIG_ENV};
use crate::connection::ConnectionTracker;
use crate::dispatcher::Dispatcher;
use crate::http::AppState;
use crate::ingest::Ingestor;
use crate::sink::DisplayBoard;
use crate::state::SourceStore;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use time::UtcOffset;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let path = config_path(cli.config.as_deref(), std::env::var(CONFIG_ENV).ok());
    let (file_cfg, config_warning) = match load_config(&path) {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => (MonitorConfig::default(), None),
        Err(e) => (MonitorConfig::default(), Some(e)),
    };
    let cfg = file_cfg.apply_cli(&cli);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = config_warning {
        warn!("{e}, using defaults");
    }

    // l'offset local doit être lu avant de lancer les threads du runtime
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(cfg, local_offset))
}

async fn run(cfg: MonitorConfig, local_offset: UtcOffset) -> anyhow::Result<()> {
    let store = Arc::new(SourceStore::new());
    let connection = ConnectionTracker::new();
    let board = DisplayBoard::new();

    // MQTT => ingestion
    let (tx, rx) = mpsc::channel(256);
    let ingest_task = Ingestor::new(store.clone(), connection.clone()).spawn(rx);
    let mqtt_task = mqtt::spawn_mqtt_listener(&cfg.mqtt, cfg.mqtt.client_id(), tx);

    // rafraîchissement 1 Hz
    let dispatch_task = Dispatcher::new(store, connection.clone(), Arc::new(board.clone()), local_offset).spawn();

    // HTTP
    let app = http::build_router(AppState { board, connection });
    let addr: SocketAddr = format!("{}:{}", cfg.http.bind, cfg.http.port)
        .parse()
        .with_context(|| format!("invalid HTTP bind address {}:{}", cfg.http.bind, cfg.http.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("shutting down");
    mqtt_task.abort();
    dispatch_task.abort();
    ingest_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
