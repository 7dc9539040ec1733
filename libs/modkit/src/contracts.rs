//! Capabilities a module can opt into. The registry calls them phase by
//! phase: init → migrate → REST wiring → start, and stop on shutdown.

use async_trait::async_trait;
use axum::Router;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use utoipa::openapi::OpenApi;

use crate::context::ModuleCtx;

/// Every module. `init` reads config and builds services; the schema is not migrated yet.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()>;
}

/// Modules owning tables.
#[async_trait]
pub trait DbModule: Send + Sync {
    async fn migrate(&self, db: &DatabaseConnection) -> anyhow::Result<()>;
}

/// Modules serving HTTP routes. Wiring only, so it stays synchronous; the
/// paths and schemas served get merged into `openapi`.
pub trait RestfulModule: Send + Sync {
    fn register_rest(
        &self,
        ctx: &ModuleCtx,
        router: Router,
        openapi: &mut OpenApi,
    ) -> anyhow::Result<Router>;
}

/// The single module owning the listener.
pub trait RestHostModule: Send + Sync + 'static {
    /// Called before any other module adds routes.
    fn rest_prepare(&self, ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router>;

    /// Called last: adds docs and global layers. Serving starts later, in `start`.
    fn rest_finalize(
        &self,
        ctx: &ModuleCtx,
        router: Router,
        openapi: OpenApi,
    ) -> anyhow::Result<Router>;
}

/// Modules with background work.
#[async_trait]
pub trait StatefulModule: Send + Sync {
    /// Returns once the work is spawned; the task watches `cancel`.
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;

    async fn stop(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}
