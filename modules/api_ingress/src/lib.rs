use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::{http::header, middleware::from_fn, response::IntoResponse, routing::get, Router};
use modkit::ModuleCtx;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use utoipa::openapi::OpenApi;

mod config;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP host: owns the listener, the global middleware stack and the docs endpoints.
pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    // finalized in the REST phase, taken by `start`
    final_router: Mutex<Option<Router>>,
    local_addr: Mutex<Option<SocketAddr>>,
    server: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Default for ApiIngress {
    fn default() -> Self {
        Self::new(ApiIngressConfig::default())
    }
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            final_router: Mutex::new(None),
            local_addr: Mutex::new(None),
            server: Mutex::new(None),
        }
    }

    pub fn config(&self) -> Arc<ApiIngressConfig> {
        self.config.load_full()
    }

    /// Address actually bound by `start` (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Wrap `router` with the global middleware stack.
    ///
    /// Outermost first: SetRequestId → PropagateRequestId → Trace →
    /// push_req_id_to_extensions → Timeout → CORS → BodyLimit.
    pub fn apply_middleware(&self, router: Router) -> Router {
        let cfg = self.config();
        let x_request_id = request_id::header();

        let mut router = router.layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));
        if cfg.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router
            .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs)))
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId))
    }

    /// Add `/openapi.json` and `/docs` (when enabled) and the middleware stack.
    pub fn finalize_router(&self, mut router: Router, openapi: OpenApi) -> Result<Router> {
        let cfg = self.config();
        if cfg.enable_docs {
            let doc = Arc::new(serde_json::to_value(&openapi).context("serialize OpenAPI document")?);
            tracing::info!(paths = openapi.paths.paths.len(), "serving OpenAPI document");
            router = router
                .route(
                    "/openapi.json",
                    get(move || {
                        let doc = doc.clone();
                        async move {
                            ([(header::CACHE_CONTROL, "no-store")], axum::Json((*doc).clone()))
                                .into_response()
                        }
                    }),
                )
                .route("/docs", get(web::serve_docs));
        }
        Ok(self.apply_middleware(router))
    }

    /// Bind and serve `router` until `cancel` fires.
    pub async fn serve(
        listener: tokio::net::TcpListener,
        router: Router,
        cancel: CancellationToken,
    ) -> Result<()> {
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>()?;
        tracing::debug!(bind_addr = %cfg.bind_addr, "api_ingress configured");
        self.config.store(Arc::new(cfg));
        Ok(())
    }
}

impl modkit::RestHostModule for ApiIngress {
    fn rest_prepare(&self, _ctx: &ModuleCtx, router: Router) -> Result<Router> {
        Ok(router.route("/health", get(web::health_check)))
    }

    fn rest_finalize(&self, _ctx: &ModuleCtx, router: Router, openapi: OpenApi) -> Result<Router> {
        let router = self.finalize_router(router, openapi)?;
        *self.final_router.lock() = Some(router.clone());
        Ok(router)
    }
}

#[async_trait]
impl modkit::StatefulModule for ApiIngress {
    /// Binds before returning so that a bad address fails startup.
    async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address '{}'", cfg.bind_addr))?;

        let router = self
            .final_router
            .lock()
            .take()
            .unwrap_or_else(|| self.apply_middleware(Router::new().route("/health", get(web::health_check))));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind {addr}"))?;
        let local = listener.local_addr()?;
        *self.local_addr.lock() = Some(local);
        tracing::info!(%local, "HTTP server bound");

        let handle = tokio::spawn(Self::serve(listener, router, cancel));
        *self.server.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self, _cancel: CancellationToken) -> Result<()> {
        let Some(handle) = self.server.lock().take() else {
            return Ok(());
        };
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(joined) => joined.context("HTTP server task panicked")?,
            Err(_) => {
                tracing::warn!("HTTP server did not stop within {:?}", STOP_TIMEOUT);
                Ok(())
            }
        }
    }
}
