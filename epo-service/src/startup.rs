//! Application startup and lifecycle management.

use crate::config::{EpoConfig, SearchProvider};
use crate::handlers;
use crate::services::{MockPatentSearch, OpsClient, PatentSearch};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<dyn PatentSearch>,
}

impl AppState {
    pub fn new(search: Arc<dyn PatentSearch>) -> Self {
        Self { search }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/status", get(handlers::status))
        .route(
            "/search",
            get(handlers::search_get).post(handlers::search_post),
        )
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Outermost, so the span above already sees the request id.
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Pick the search backend named by the configuration.
pub fn search_backend(config: &EpoConfig) -> Result<Arc<dyn PatentSearch>, AppError> {
    match config.epo.provider {
        SearchProvider::Ops => {
            let client = OpsClient::new(&config.epo).map_err(AppError::InternalError)?;
            tracing::info!(
                base_url = %config.epo.base_url,
                timeout_secs = config.epo.request_timeout_secs,
                "Initialized EPO OPS client"
            );
            Ok(Arc::new(client))
        }
        SearchProvider::Mock => {
            tracing::warn!("Using mock search provider; no requests will reach EPO");
            Ok(Arc::new(MockPatentSearch::default()))
        }
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: EpoConfig) -> Result<Self, AppError> {
        config.validate()?;
        let search = search_backend(&config)?;
        Self::build_with_search(config, search).await
    }

    /// Build with an explicit search backend (port 0 = random port for testing).
    pub async fn build_with_search(
        config: EpoConfig,
        search: Arc<dyn PatentSearch>,
    ) -> Result<Self, AppError> {
        let router = build_router(AppState::new(search));

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
