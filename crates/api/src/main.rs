//! DeepSleep Hub - Main Entry Point
//!
//! Wires the repository (with whichever durable backends the configuration
//! names), the MQTT client, the dispatcher, the automation controller, the
//! ingestion gateway, and the REST server, then runs until SIGINT/SIGTERM.
//! A backend that fails to come up is logged once and skipped; the hub runs
//! degraded memory-only rather than crashing.

use anyhow::{Context, Result};
use api::config::{self, TransportKind};
use api::{create_router, AppState};
use automation::{AutomationController, SettingsStore};
use device_control::{CommandDispatcher, CommandSink, CommandTransport};
use ingest::{HttpHeartRateFeed, IngestGateway};
use rumqttc::{AsyncClient, MqttOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{BucketBackend, RelationalBackend, ShadowClient, StateRepository};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("=== DeepSleep Hub v{} ===", env!("CARGO_PKG_VERSION"));

    let config = config::load().context("loading configuration")?;
    let backend_timeout = Duration::from_millis(config.repository.backend_timeout_ms);

    // ── Repository + durable backends ───────────────────────────────
    let mut repository = StateRepository::new(config.repository.repository_config());

    if let Some(database) = &config.database {
        match RelationalBackend::connect(&database.relational_config()).await {
            Ok(backend) => repository = repository.with_backend(Arc::new(backend)),
            Err(e) => error!("relational backend disabled, running degraded: {e}"),
        }
    }

    if let Some(bucket) = &config.bucket {
        match BucketBackend::new(&bucket.bucket_config(backend_timeout)) {
            Ok(backend) => repository = repository.with_backend(Arc::new(backend)),
            Err(e) => error!("bucket backend disabled, running degraded: {e}"),
        }
    }

    let shadow = match &config.shadow {
        Some(settings) => match ShadowClient::new(&settings.shadow_config(backend_timeout)) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!("device shadow disabled, running degraded: {e}");
                None
            }
        },
        None => None,
    };
    if let Some(shadow) = &shadow {
        repository = repository.with_shadow(Arc::clone(shadow));
    }

    let repository = Arc::new(repository);

    // ── MQTT client ─────────────────────────────────────────────────
    let mut options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    let (client, eventloop) = AsyncClient::new(options, 32);

    // ── Dispatcher + controller ─────────────────────────────────────
    let transport = match config.automation.transport {
        TransportKind::Mqtt => CommandTransport::Mqtt(client.clone()),
        TransportKind::Shadow => match &shadow {
            Some(shadow) => CommandTransport::Shadow(Arc::clone(shadow)),
            None => {
                warn!("shadow transport configured without a shadow endpoint, using mqtt");
                CommandTransport::Mqtt(client.clone())
            }
        },
    };
    let dispatcher = Arc::new(CommandDispatcher::new(transport, Arc::clone(&repository)));
    let settings = Arc::new(SettingsStore::default());
    let controller = Arc::new(
        AutomationController::new(
            Arc::clone(&repository),
            Arc::clone(&settings),
            Arc::clone(&dispatcher) as Arc<dyn CommandSink>,
        )
        .with_policy(config.automation.redispatch),
    );

    // ── Ingestion gateway ───────────────────────────────────────────
    let mut gateway = IngestGateway::new(Arc::clone(&repository), Arc::clone(&controller));
    if let Some(wearable) = &config.wearable {
        match HttpHeartRateFeed::new(&wearable.wearable_config(backend_timeout)) {
            Ok(feed) => gateway = gateway.with_feed(Arc::new(feed)),
            Err(e) => warn!("wearable feed disabled: {e}"),
        }
    }
    let gateway = Arc::new(gateway);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── REST server ─────────────────────────────────────────────────
    let state = Arc::new(AppState {
        repository: Arc::clone(&repository),
        dispatcher: Arc::clone(&dispatcher),
        controller: Arc::clone(&controller),
        settings: Arc::clone(&settings),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: Instant::now(),
    });
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("binding {}", config.http.bind))?;
    info!(addr = %config.http.bind, "api server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("api server error: {e}");
        }
    });

    // ── Optional periodic automation trigger ────────────────────────
    if let Some(secs) = config.automation.poll_interval_secs {
        tokio::spawn(
            Arc::clone(&controller).run_periodic(Duration::from_secs(secs), shutdown_rx.clone()),
        );
    }

    // ── Telemetry loop ──────────────────────────────────────────────
    let ingest_handle = tokio::spawn(ingest::run(
        gateway,
        client.clone(),
        eventloop,
        shutdown_rx.clone(),
    ));

    // ── Signal handling ─────────────────────────────────────────────
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }

    let _ = shutdown_tx.send(true);
    let _ = ingest_handle.await;
    info!("shutdown complete");
    Ok(())
}
