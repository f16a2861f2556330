//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, create_app};
use event_store::{
    ChangeFeed, CheckpointStore, EventStore, InMemoryEventStore, PostgresEventStore, SnapshotStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemorySagaLogRepository, PostgresSagaLogRepository, SagaLogRepository};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Rebuilds read models, starts the optional listener and serves until a
/// shutdown signal arrives.
async fn run<S>(
    store: S,
    saga_logs: Arc<dyn SagaLogRepository>,
    config: Config,
    metrics_handle: PrometheusHandle,
) where
    S: EventStore + SnapshotStore + ChangeFeed + CheckpointStore + Clone + 'static,
{
    let state = Arc::new(AppState::new(store, saga_logs, &config));

    let report = state
        .rebuild_projections()
        .await
        .expect("startup projection rebuild failed");
    tracing::info!(
        account_events = report.account_events,
        claim_events = report.claim_events,
        order_events = report.order_events,
        "read models rebuilt"
    );

    let listener_handle = state
        .start_notification_listener()
        .await
        .expect("failed to start change feed listener");

    let app = create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(handle) = listener_handle {
        if let Err(e) = handle.shutdown().await {
            tracing::warn!(error = %e, "change feed listener did not stop cleanly");
        }
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the backend and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresEventStore::new(pool.clone());
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using Postgres event store");

            let saga_logs = Arc::new(PostgresSagaLogRepository::new(pool));
            run(store, saga_logs, config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            let saga_logs = Arc::new(InMemorySagaLogRepository::new());
            run(InMemoryEventStore::new(), saga_logs, config, metrics_handle).await;
        }
    }
}
