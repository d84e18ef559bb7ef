//! LBF Operator - land-borrow-farm strategy orchestrator
//!
//! Wires the store, chain client, notifiers and scheduler, recovers
//! interrupted work and serves `/health` and `/metrics` until shutdown.

use axum::{routing::get, Router};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use lbf_operator::chain::{ChainClient, GatewayClient};
use lbf_operator::config::AppConfig;
use lbf_operator::db;
use lbf_operator::engine::{JobScheduler, OperationStateMachine, RecoveryManager, StrategyRunner};
use lbf_operator::handlers::{health_check, HealthState};
use lbf_operator::metrics::{metrics_router, MetricsState};
use lbf_operator::notifications::{
    CompositeNotifier, NotificationEvent, NotificationSink, SlackNotifier, TelegramNotifier,
};
use lbf_operator::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting LBF Operator v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        chain_id = config.chain.chain_id,
        "Configuration loaded"
    );

    let db_pool = db::init_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database initialized");

    let metrics = Arc::new(MetricsState::new()?);
    let notifier = Arc::new(build_notifier(&config, metrics.clone())?);
    let chain: Arc<dyn ChainClient> = Arc::new(GatewayClient::new(&config.chain)?);
    let store = SqliteStore::new(db_pool.clone());

    let state_machine = Arc::new(OperationStateMachine::new(
        Arc::new(store.clone()),
        std::process::id(),
    ));
    let runner = Arc::new(StrategyRunner::new(
        chain,
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        notifier.clone(),
        config.multicall.batching_enabled,
    ));
    let scheduler = JobScheduler::new(
        state_machine.clone(),
        Arc::new(store.clone()),
        runner,
        notifier.clone(),
        &config.scheduler,
        Some(metrics.clone()),
    );

    let recovery = Arc::new(RecoveryManager::new(
        scheduler.clone(),
        notifier.clone(),
        &config.scheduler,
    ));
    let report = recovery.recover_on_startup().await?;
    tracing::info!(
        interrupted = report.interrupted,
        restored = report.restored,
        "Startup recovery finished"
    );

    let shutdown = CancellationToken::new();
    let sweep = recovery.clone();
    let sweep_shutdown = shutdown.clone();
    tokio::spawn(async move {
        sweep.start_background_task(sweep_shutdown).await;
    });

    let health_state = Arc::new(HealthState {
        db: db_pool.clone(),
        scheduler: scheduler.clone(),
        started_at: Utc::now(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(health_state)
        .merge(metrics_router().with_state(metrics))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    shutdown.cancel();
    scheduler.shutdown();

    let interrupted = state_machine.fail_owned_in_progress().await?;
    if !interrupted.is_empty() {
        tracing::warn!(count = interrupted.len(), "Running operations marked FAILED_SHUTDOWN");
        notifier
            .notify(NotificationEvent::OperationsShutdown {
                count: interrupted.len(),
            })
            .await;
    }

    Ok(())
}

fn build_notifier(config: &AppConfig, metrics: Arc<MetricsState>) -> anyhow::Result<CompositeNotifier> {
    let mut notifier = CompositeNotifier::new().with_metrics(metrics);

    if config.notifications.telegram.enabled {
        notifier.add_service(Arc::new(TelegramNotifier::new(&config.notifications.telegram)?));
    }
    if config.notifications.slack.enabled {
        notifier.add_service(Arc::new(SlackNotifier::new(&config.notifications.slack)?));
    }

    tracing::info!(services = notifier.service_count(), "Notifications configured");
    Ok(notifier)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lbf_operator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
