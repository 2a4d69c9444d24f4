//! API server entry point.

use api::config::{Config, LogFormat};
use api::state::AppState;
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
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
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: DocumentStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let state = AppState::build(store, &config).expect("failed to build HTTP client");

    if config.service.serves_payments() {
        match state.payments.recover_settlements().await {
            Ok(report) => tracing::info!(?report, "pending settlements recovered"),
            Err(e) => tracing::error!(error = %e, "settlement recovery failed"),
        }
    }

    let app = api::create_app(state, metrics_handle, &config);

    let addr = config.addr();
    tracing::info!(%addr, service = ?config.service, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load .env and configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // 2. Initialize tracing
    init_tracing(&config);
    if config.is_production() && config.jwt_secret == api::config::DEV_JWT_SECRET {
        tracing::warn!("JWT_SECRET is not set; using the development secret");
    }

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick storage and run
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresDocumentStore::connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            serve(InMemoryDocumentStore::new(), config, metrics_handle).await;
        }
    }
}
