use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use modkit::{DbModule, Module, ModuleCtx, RelayHub, RestfulModule, SseBroadcaster};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};
use utoipa::openapi::OpenApi;

use crate::api::rest::dto::ProfileEvent;
use crate::api::rest::routes::{self, RouteDeps};
use crate::api::rest::sse_adapter::SseProfileEventPublisher;
use crate::config::ProfileConfig;
use crate::contract::client::ProfileApi;
use crate::domain::service::{Service, ServiceConfig};
use crate::gateways::local::ProfileLocalClient;
use crate::infra::storage::sea_orm_repo::SeaOrmProfileRepository;
use crate::infra::uploads::DiskAvatarStore;

/// Everything the REST phase needs, built once in `init`.
struct Wiring {
    service: Arc<Service>,
    sse: SseBroadcaster<ProfileEvent>,
    hub: RelayHub<Arc<str>>,
    api_prefix: String,
    uploads_dir: PathBuf,
    max_upload_bytes: usize,
}

/// The profile module: document store, avatar uploads, SSE feed and change relay.
#[derive(Default)]
pub struct ProfileModule {
    wiring: ArcSwapOption<Wiring>,
}

impl ProfileModule {
    /// In-process client; available once `init` has run.
    pub fn client(&self) -> Option<Arc<dyn ProfileApi>> {
        self.wiring.load().as_ref().map(|w| {
            Arc::new(ProfileLocalClient::new(w.service.clone())) as Arc<dyn ProfileApi>
        })
    }

    /// Connected relay sockets.
    pub fn relay_members(&self) -> usize {
        self.wiring
            .load()
            .as_ref()
            .map(|w| w.hub.member_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Module for ProfileModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing profile module");

        let cfg: ProfileConfig = ctx.module_config()?;
        debug!(
            profile_key = %cfg.profile_key,
            api_prefix = %cfg.api_prefix,
            uploads_dir = %cfg.uploads_dir,
            "Loaded profile config"
        );

        let db: DatabaseConnection = ctx.db_required()?.clone();
        let repo = SeaOrmProfileRepository::new(db);

        let uploads_dir = match ctx.home_dir() {
            Some(home) => home.join(&cfg.uploads_dir),
            None => PathBuf::from(&cfg.uploads_dir),
        };
        let avatars = DiskAvatarStore::new(uploads_dir.clone());

        let sse = SseBroadcaster::<ProfileEvent>::new(cfg.events_capacity);
        let publisher = SseProfileEventPublisher::new(sse.clone());

        let service = Service::new(
            Arc::new(repo),
            Arc::new(publisher),
            Arc::new(avatars),
            ServiceConfig {
                profile_key: cfg.profile_key.clone(),
                max_bio_length: cfg.max_bio_length,
                max_upload_bytes: cfg.max_upload_bytes,
            },
        );

        self.wiring.store(Some(Arc::new(Wiring {
            service: Arc::new(service),
            sse,
            hub: RelayHub::new(cfg.relay_capacity),
            api_prefix: cfg.api_prefix,
            uploads_dir,
            max_upload_bytes: cfg.max_upload_bytes,
        })));
        Ok(())
    }
}

#[async_trait]
impl DbModule for ProfileModule {
    async fn migrate(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        info!("Running profile database migrations");
        crate::infra::storage::migrations::Migrator::up(db, None)
            .await
            .context("profile migrations failed")?;
        Ok(())
    }
}

impl RestfulModule for ProfileModule {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: axum::Router,
        openapi: &mut OpenApi,
    ) -> anyhow::Result<axum::Router> {
        info!("Registering profile REST routes");

        let wiring = self
            .wiring
            .load_full()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))?;

        let router = routes::register_routes(
            router,
            openapi,
            RouteDeps {
                service: wiring.service.clone(),
                sse: wiring.sse.clone(),
                hub: wiring.hub.clone(),
                api_prefix: &wiring.api_prefix,
                uploads_dir: &wiring.uploads_dir,
                max_upload_bytes: wiring.max_upload_bytes,
            },
        )?;
        info!(prefix = %wiring.api_prefix, "Profile REST routes registered");
        Ok(router)
    }
}
