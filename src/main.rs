//! Tenantry server.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use tenantry_api::{AppState, build_router};
use tenantry_cache::provider::CacheManager;
use tenantry_core::config::AppConfig;
use tenantry_core::error::AppError;
use tenantry_core::lifecycle::TaskSupervisor;
use tenantry_core::result::AppResult;
use tenantry_core::traits::cache::CacheProvider;
use tenantry_core::traits::repository::Repository;
use tenantry_database::migration::run_migrations;
use tenantry_database::{DatabasePool, DocumentStore, PgHistoryStore, PgMetricsPersister};
use tenantry_entity::Customer;
use tenantry_metrics::{
    MemoryMetricsPersister, MetricsCleanupJob, MetricsPersister, MetricsRegistry,
    MetricsRetentionJob, PersistMetricsJob,
};
use tenantry_repository::{
    HistoryStore, MemoryHistoryStore, MemoryRepository, Pipeline, PipelineBuilder,
};

const CUSTOMER_COLLECTION: &str = "customers";

#[tokio::main]
async fn main() {
    let env = std::env::var("TENANTRY_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing. `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Storage-dependent parts of the application.
struct Stores {
    customers: Pipeline<Customer, Uuid>,
    metrics_persister: Arc<dyn MetricsPersister>,
    database: Option<DatabasePool>,
}

fn customer_pipeline<B>(
    config: &AppConfig,
    base: B,
    history: Arc<dyn HistoryStore>,
    cache: Arc<dyn CacheProvider>,
) -> Pipeline<Customer, Uuid>
where
    B: Repository<Customer, Uuid>,
{
    let mut builder = PipelineBuilder::<Customer, Uuid>::new("Customer")
        .with_cache(cache, config.cache.default_ttl());
    if config.history.enabled {
        builder = builder.with_history(history);
    }
    builder.build(base)
}

/// Connects PostgreSQL when `database.url` is set, otherwise falls back to memory stores.
async fn build_stores(config: &AppConfig, cache: Arc<dyn CacheProvider>) -> AppResult<Stores> {
    if config.database.url.is_none() {
        tracing::warn!("database.url is not set, using in-memory stores");
        return Ok(Stores {
            customers: customer_pipeline(
                config,
                MemoryRepository::<Customer, Uuid>::new(),
                Arc::new(MemoryHistoryStore::new()),
                cache,
            ),
            metrics_persister: Arc::new(MemoryMetricsPersister::new()),
            database: None,
        });
    }

    let database = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        run_migrations(database.pool()).await?;
    }

    let pool = database.pool().clone();
    Ok(Stores {
        customers: customer_pipeline(
            config,
            DocumentStore::<Customer, Uuid>::new(pool.clone(), CUSTOMER_COLLECTION),
            Arc::new(PgHistoryStore::new(pool.clone())),
            cache,
        ),
        metrics_persister: Arc::new(PgMetricsPersister::new(pool)),
        database: Some(database),
    })
}

/// Main server run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Tenantry");

    let mut supervisor = TaskSupervisor::new();

    // ── Cache ────────────────────────────────────────────────────
    let cache = CacheManager::new(&config.cache)?;
    for job in cache.background_jobs() {
        supervisor.spawn(job);
    }

    // ── Storage ──────────────────────────────────────────────────
    let stores = build_stores(&config, cache.provider()).await?;

    // ── Metrics ──────────────────────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new(config.metrics.clone()));
    if config.metrics.enabled {
        supervisor.spawn(Arc::new(MetricsCleanupJob::new(metrics.clone())));
        if config.metrics.enable_persistence {
            supervisor.spawn(Arc::new(PersistMetricsJob::new(
                metrics.clone(),
                stores.metrics_persister.clone(),
            )));
            supervisor.spawn(Arc::new(MetricsRetentionJob::new(
                stores.metrics_persister.clone(),
                config.metrics.retention_days,
            )));
        }
    }
    tracing::info!(jobs = supervisor.len(), "Background jobs started");

    // ── HTTP server ──────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_router(AppState {
        config: Arc::new(config),
        metrics,
        metrics_persister: stores.metrics_persister,
        customers: stores.customers,
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "Tenantry listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")));

    supervisor.shutdown(grace).await;
    if let Some(database) = stores.database {
        database.close().await;
    }

    served?;
    tracing::info!("Tenantry shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
