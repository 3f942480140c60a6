use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xplain_core::capability::{Classifier, Explainer};
use xplain_core::labels::{LabelSet, DEFAULT_LABEL_COLUMN};
use xplain_core::registry::JobRegistry;
use xplain_core::storage::{ArtifactStore, FsArtifactStore};
use xplain_pipeline::{JobRunner, RemoteClassifier, SampledExplainer};

use xplain_api::background::job_retention;
use xplain_api::config::ServerConfig;
use xplain_api::router::build_app_router;
use xplain_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "xplain_api=debug,xplain_pipeline=debug,xplain_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Labels ---
    let labels = LabelSet::load(&config.labels_path, DEFAULT_LABEL_COLUMN)
        .expect("Failed to load label set");
    tracing::info!(count = labels.len(), path = %config.labels_path.display(), "Label set loaded");

    // --- Database (optional) ---
    let pool = match &config.database_url {
        Some(url) => {
            let pool = xplain_db::create_pool(url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            xplain_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            xplain_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");
            Some(pool)
        }
        None => None,
    };

    // --- Artifact storage ---
    let store: Arc<dyn ArtifactStore> = match &pool {
        Some(pool) => {
            tracing::info!("Storing artifacts in the database");
            Arc::new(xplain_db::PgArtifactStore::new(pool.clone()))
        }
        None => {
            tracing::info!(dir = %config.artifact_dir.display(), "Storing artifacts on disk");
            Arc::new(FsArtifactStore::new(config.artifact_dir.clone()))
        }
    };

    // --- Capabilities ---
    let classifier: Arc<dyn Classifier> = Arc::new(RemoteClassifier::new(config.model_url.clone()));
    let explainer: Arc<dyn Explainer> = Arc::new(SampledExplainer::default());
    tracing::info!(model_url = %config.model_url, "Classifier configured");

    // --- Jobs ---
    let registry = Arc::new(JobRegistry::new());
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&registry),
        Arc::clone(&classifier),
        explainer,
        Arc::clone(&store),
        config.runner_config(),
    ));

    let retention_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(job_retention::run(
        Arc::clone(&registry),
        config.job_retention(),
        job_retention::SWEEP_INTERVAL,
        retention_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        runner,
        classifier,
        labels: Arc::new(labels),
        store,
        pool,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Open progress streams only end once their job is terminal, so jobs
    // are cancelled as soon as the signal arrives rather than after serve.
    let jobs = Arc::clone(&registry);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            jobs.cancel_all();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(remaining_jobs = registry.len(), "Server stopped accepting connections, cleaning up");

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Job retention task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
