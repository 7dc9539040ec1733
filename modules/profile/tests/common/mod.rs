#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use api_ingress::{ApiIngress, ApiIngressConfig};
use axum::{body::Body, http::Request, response::Response, Router};
use modkit::{ConfigProvider, ModuleCtxBuilder, ModuleEntry, ModuleRegistry};
use profile::ProfileModule;
use sea_orm::Database;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct MapProvider(HashMap<String, Value>);

impl ConfigProvider for MapProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get(module_name)
    }
}

pub struct TestApp {
    pub router: Router,
    pub profile: Arc<ProfileModule>,
}

/// Ingress + profile on a fresh in-memory SQLite DB, driven through every
/// registry phase except `start`.
pub async fn build_app(home: &Path, profile_cfg: Value) -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    let ingress = Arc::new(ApiIngress::new(ApiIngressConfig::default()));
    let profile = Arc::new(ProfileModule::default());
    let registry = ModuleRegistry::builder()
        .register(ModuleEntry::new("api_ingress", ingress.clone()).rest_host(ingress.clone()))
        .register(
            ModuleEntry::new("profile", profile.clone())
                .deps(&["api_ingress"])
                .db(profile.clone())
                .rest(profile.clone()),
        )
        .build()
        .expect("registry");

    let provider = MapProvider(HashMap::from([("profile".to_owned(), profile_cfg)]));
    let ctx = ModuleCtxBuilder::new(CancellationToken::new())
        .with_db(db.clone())
        .with_config_provider(Arc::new(provider))
        .with_home_dir(home)
        .build();

    registry.run_init_phase(&ctx).await.expect("init");
    registry.run_db_phase(&db).await.expect("migrate");
    let router = registry
        .run_rest_phase(&ctx, Router::new(), utoipa::openapi::OpenApiBuilder::new().build())
        .expect("rest");

    TestApp { router, profile }
}

pub async fn default_app(home: &Path) -> TestApp {
    build_app(home, json!({})).await
}

pub async fn send(app: &Router, req: Request<Body>) -> (u16, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    (status, body_json(resp).await)
}

pub async fn body_json(resp: Response) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

pub fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const BOUNDARY: &str = "profile-test-boundary";

pub fn multipart(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/profile/upload-avatar")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
