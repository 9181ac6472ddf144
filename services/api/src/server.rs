use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use signodrive::config::{AppConfig, FrappeConfig, StorageBackend};
use signodrive::error::AppError;
use signodrive::frappe::{FrappeClient, FrappeError};
use signodrive::marketplace::{
    InMemoryStorage, MarketplaceService, MarketplaceStorage, SqliteStorage,
};
use signodrive::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(storage) = args.storage.take() {
        config.storage.backend = storage;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory storage");
            serve(config, Arc::new(InMemoryStorage::new())).await
        }
        StorageBackend::Sqlite => {
            let storage = SqliteStorage::open(&config.storage.database_path)?;
            info!(
                path = %storage.path().display(),
                schema_version = storage.schema_version()?,
                "using sqlite storage"
            );
            serve(config, Arc::new(storage)).await
        }
    }
}

async fn serve<S>(config: AppConfig, storage: Arc<S>) -> Result<(), AppError>
where
    S: MarketplaceStorage + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    let frappe = frappe_client(&config.frappe)?;

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        frappe,
    };

    let service = Arc::new(MarketplaceService::new(storage, &config.registration));
    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "signodrive marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Unset credentials leave the proxies disabled; a malformed URL stops startup.
fn frappe_client(config: &FrappeConfig) -> Result<Option<Arc<FrappeClient>>, AppError> {
    match FrappeClient::from_config(config) {
        Ok(client) => {
            info!(base_url = %client.base_url(), "frappe proxy enabled");
            Ok(Some(Arc::new(client)))
        }
        Err(FrappeError::NotConfigured) => {
            info!("frappe proxy disabled, FRAPPE_BASE_URL is unset");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
