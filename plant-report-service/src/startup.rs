use crate::config::ReportServiceConfig;
use crate::handlers;
use crate::services::providers::{GeminiConfig, GeminiTextProvider, TextProvider};
use crate::services::ReportRenderer;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: ReportServiceConfig,
    pub provider: Arc<dyn TextProvider>,
    pub renderer: ReportRenderer,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: ReportServiceConfig) -> Result<Self, AppError> {
        let provider = GeminiTextProvider::new(GeminiConfig {
            api_key: config.gemini.api_key.clone(),
            model: config.gemini.model.clone(),
            api_base_url: config.gemini.api_base_url.clone(),
            timeout: Duration::from_secs(config.gemini.timeout_secs),
        })
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{}", e)))?;

        tracing::info!(model = %provider.model(), "Gemini provider initialized");

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build against an already constructed provider.
    pub async fn build_with_provider(
        config: ReportServiceConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.reports.dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create reports directory {}: {}",
                    config.reports.dir.display(),
                    e
                );
                e
            })?;

        let state = AppState {
            config: config.clone(),
            provider,
            renderer: ReportRenderer::new(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route("/analyze", post(handlers::analyze_image))
            .route("/download", post(handlers::download_report))
            .fallback_service(ServeDir::new(&config.server.public_dir))
            .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
            .layer(from_fn(security_headers_middleware))
            .layer(from_fn(metrics_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.0.as_str())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            // Outermost, so the trace span already sees the id
            .layer(from_fn(request_id_middleware))
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
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

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
