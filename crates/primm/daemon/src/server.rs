//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use primm_progress::{ProgressService, ReconcileJob, ReconcileWorker, StubExecutor};
use primm_storage::{CatalogSeed, InMemoryPrimmStorage, PrimmStorage};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// PRIMM daemon server
pub struct Server {
    config: DaemonConfig,
    progress: Arc<ProgressService>,
    worker: Arc<ReconcileWorker>,
    worker_rx: mpsc::Receiver<ReconcileJob>,
}

impl Server {
    /// Create a new server with the given configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = build_storage(&config.storage).await?;

        let service = ProgressService::new(
            storage,
            Arc::new(StubExecutor),
            config.progress.clone(),
        );
        let (worker, worker_rx) =
            ReconcileWorker::new(service.aggregator(), config.progress.reconcile.clone());
        let progress = Arc::new(service.with_retry_queue(worker.queue()));

        Ok(Self {
            config,
            progress,
            worker,
            worker_rx,
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.progress.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("PRIMM daemon listening on {}", addr);
        tracing::info!(
            reward_policy = ?self.config.progress.reward_policy,
            investigate_min_chars = self.config.progress.investigate_min_chars,
            "Progress core configured"
        );

        let worker = self.worker.clone();
        let worker_handle = tokio::spawn(worker.start(self.worker_rx));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("PRIMM daemon shutting down");

        self.worker.stop().await;
        if let Err(e) = worker_handle.await {
            tracing::error!(error = %e, "Reconcile worker terminated abnormally");
        }

        Ok(())
    }
}

async fn build_storage(config: &StorageConfig) -> DaemonResult<Arc<dyn PrimmStorage>> {
    match config {
        StorageConfig::Memory { seed_file } => {
            let storage = match seed_file {
                Some(path) => {
                    let seed = CatalogSeed::from_json_file(path)?;
                    tracing::info!(
                        path = %path.display(),
                        lessons = seed.lessons.len(),
                        courses = seed.courses.len(),
                        stages = seed.stages.len(),
                        "Loaded catalog seed"
                    );
                    InMemoryPrimmStorage::from_seed(seed)
                }
                None => InMemoryPrimmStorage::new(),
            };
            tracing::warn!("Using in-memory storage; progress is lost on restart");
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage = primm_storage::postgres::PostgresPrimmStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            tracing::info!(max_connections, "Connected to PostgreSQL");
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(DaemonError::Config(
            "postgres storage requires building primmd with the `postgres` feature".to_string(),
        )),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
