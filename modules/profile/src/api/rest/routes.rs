use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Extension, Router,
};
use modkit::{RelayHub, SseBroadcaster};
use tower_http::services::ServeDir;
use utoipa::openapi::OpenApi;

use crate::api::relay::relay_ws;
use crate::api::rest::openapi::document;
use crate::api::rest::{dto::ProfileEvent, handlers};
use crate::domain::service::Service;
use crate::infra::uploads::disk::UPLOADS_URL_PREFIX;

/// Headroom for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct RouteDeps<'a> {
    pub service: Arc<Service>,
    pub sse: SseBroadcaster<ProfileEvent>,
    pub hub: RelayHub<Arc<str>>,
    pub api_prefix: &'a str,
    pub uploads_dir: &'a Path,
    pub max_upload_bytes: usize,
}

pub fn register_routes(
    router: Router,
    openapi: &mut OpenApi,
    deps: RouteDeps<'_>,
) -> anyhow::Result<Router> {
    let prefix = deps.api_prefix.trim_end_matches('/');
    if !prefix.is_empty() && !prefix.starts_with('/') {
        bail!("api_prefix must start with '/': {:?}", deps.api_prefix);
    }

    let profile = Router::new()
        .route(
            "/profile/{id}",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/profile/experience", post(handlers::add_experience))
        .route(
            "/profile/experience/{id}",
            put(handlers::update_experience).delete(handlers::delete_experience),
        )
        .route("/profile/education", post(handlers::add_education))
        .route(
            "/profile/education/{id}",
            put(handlers::update_education).delete(handlers::delete_education),
        )
        .route("/profile/certification", post(handlers::add_certification))
        .route(
            "/profile/certification/{id}",
            put(handlers::update_certification).delete(handlers::delete_certification),
        )
        .route("/profile/skills", post(handlers::replace_skills))
        .route("/profile/skills/{name}", delete(handlers::delete_skill))
        .route("/profile/endorse/{skillName}", post(handlers::endorse_skill))
        .route(
            "/profile/upload-avatar",
            post(handlers::upload_avatar)
                .layer(DefaultBodyLimit::max(deps.max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .layer(Extension(deps.service));

    let events = Router::new()
        .route("/profile/events", get(handlers::profile_events))
        .layer(Extension(deps.sse));

    let relay = Router::new()
        .route("/relay", get(relay_ws))
        .layer(Extension(deps.hub));

    let api = profile.merge(events).merge(relay);
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(prefix, api)
    };

    openapi.merge(document(prefix));

    Ok(router.nest_service(UPLOADS_URL_PREFIX, ServeDir::new(deps.uploads_dir)))
}
