use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};

use radiotherm_common::BridgeConfig;

use crate::{poller, status::StatusBoard};

#[derive(Clone)]
struct AppState {
    board: Arc<RwLock<StatusBoard>>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("RADIOTHERM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./radiotherm.json"));
    let mut config = load_config(&config_path).await.unwrap_or_else(|err| {
        warn!("failed to load config from {}: {err:#}", config_path.display());
        BridgeConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());
    config.sanitize();

    let board = Arc::new(RwLock::new(StatusBoard::default()));
    poller::spawn(config.clone(), board.clone());

    let app = Router::new()
        .route("/api/sensors", get(handle_get_sensors))
        .route("/api/devices", get(handle_get_devices))
        .with_state(AppState { board });

    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("radiotherm bridge listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("status server failed")?;
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(serde_json::from_slice::<BridgeConfig>(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(BridgeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn handle_get_sensors(State(state): State<AppState>) -> impl IntoResponse {
    let sensors = state.board.read().await.sensors.clone();
    Json(sensors)
}

async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let devices = state.board.read().await.devices.clone();
    Json(devices)
}
