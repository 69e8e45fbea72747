//! authsync operator - keeps authentik in sync with identity manifests

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod health;

use authsync_authentik::AuthentikClient;
use authsync_reconcile::{build_reconcilers, Controller};
use authsync_store::{load_dir, MemoryStore};
use config::Settings;
use health::Readiness;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;

    info!("Starting authsync operator v{}", env!("CARGO_PKG_VERSION"));
    info!(authentik = %settings.authentik.url, "Configuration loaded successfully");

    let client = AuthentikClient::new(&settings.authentik.client_config())
        .context("Failed to create authentik client")?;
    let api = Arc::new(client);
    let store = Arc::new(MemoryStore::new());

    // Subscribe before loading so no change is missed
    let events = store.subscribe();
    let manifests = load_dir(&settings.operator.manifests_dir).with_context(|| {
        format!(
            "Failed to load manifests from {}",
            settings.operator.manifests_dir.display()
        )
    })?;
    for manifest in manifests {
        let kind = manifest.kind();
        let key = manifest
            .apply(&store)
            .await
            .with_context(|| format!("Failed to apply {} manifest", kind))?;
        info!(%kind, %key, "Applied manifest");
    }

    let reconcilers = build_reconcilers(
        api,
        store.clone(),
        &settings.operator.reconciler_config(),
    );
    let controller = Arc::new(Controller::new(
        reconcilers,
        store,
        settings.operator.controller_config(),
    ));

    let readiness = Readiness::default();
    tokio::spawn(readiness.clone().mark_ready_when(controller.synced()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_task = tokio::spawn(controller.run(events, shutdown_rx));

    let app = health::router(readiness).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("Health endpoints on http://{}/live and /ready", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping controller");
    let _ = shutdown_tx.send(true);
    if let Err(e) = controller_task.await {
        error!("Controller task failed: {}", e);
    }

    info!("authsync operator stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,authsync=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
