use axum::Router;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use utoipa::openapi::OpenApi;

use crate::context::ModuleCtx;
use crate::contracts;

/// One module and the capabilities it opted into.
pub struct ModuleEntry {
    pub name: &'static str,
    pub deps: &'static [&'static str],
    pub core: Arc<dyn contracts::Module>,
    pub rest: Option<Arc<dyn contracts::RestfulModule>>,
    pub rest_host: Option<Arc<dyn contracts::RestHostModule>>,
    pub db: Option<Arc<dyn contracts::DbModule>>,
    pub stateful: Option<Arc<dyn contracts::StatefulModule>>,
}

impl ModuleEntry {
    pub fn new(name: &'static str, core: Arc<dyn contracts::Module>) -> Self {
        Self {
            name,
            deps: &[],
            core,
            rest: None,
            rest_host: None,
            db: None,
            stateful: None,
        }
    }

    pub fn deps(mut self, deps: &'static [&'static str]) -> Self {
        self.deps = deps;
        self
    }

    pub fn rest(mut self, m: Arc<dyn contracts::RestfulModule>) -> Self {
        self.rest = Some(m);
        self
    }

    pub fn rest_host(mut self, m: Arc<dyn contracts::RestHostModule>) -> Self {
        self.rest_host = Some(m);
        self
    }

    pub fn db(mut self, m: Arc<dyn contracts::DbModule>) -> Self {
        self.db = Some(m);
        self
    }

    pub fn stateful(mut self, m: Arc<dyn contracts::StatefulModule>) -> Self {
        self.stateful = Some(m);
        self
    }
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_rest", &self.rest.is_some())
            .field("is_rest_host", &self.rest_host.is_some())
            .field("has_db", &self.db.is_some())
            .field("has_stateful", &self.stateful.is_some())
            .finish()
    }
}

/// Modules in dependency order, driven through init → DB → REST → start → stop.
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.modules.iter().map(|m| m.name).collect();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .finish()
    }
}

impl ModuleRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub async fn run_init_phase(&self, base_ctx: &ModuleCtx) -> Result<(), RegistryError> {
        for e in &self.modules {
            let ctx = base_ctx.clone().for_module(e.name);
            e.core
                .init(&ctx)
                .await
                .map_err(|source| RegistryError::Init {
                    module: e.name,
                    source,
                })?;
        }
        Ok(())
    }

    pub async fn run_db_phase(&self, db: &DatabaseConnection) -> Result<(), RegistryError> {
        for e in &self.modules {
            if let Some(dbm) = &e.db {
                tracing::debug!(module = e.name, "running migrations");
                dbm.migrate(db)
                    .await
                    .map_err(|source| RegistryError::DbMigrate {
                        module: e.name,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Host prepare → every module registers routes and docs → host finalize.
    pub fn run_rest_phase(
        &self,
        base_ctx: &ModuleCtx,
        mut router: Router,
        mut openapi: OpenApi,
    ) -> Result<Router, RegistryError> {
        let mut hosts = self
            .modules
            .iter()
            .filter_map(|e| e.rest_host.as_ref().map(|h| (e.name, h)));
        let host = hosts.next();
        if hosts.next().is_some() {
            return Err(RegistryError::MultipleRestHosts);
        }
        let Some((host_name, host)) = host else {
            return if self.modules.iter().any(|e| e.rest.is_some()) {
                Err(RegistryError::RestRequiresHost)
            } else {
                Ok(router)
            };
        };
        let host_ctx = base_ctx.clone().for_module(host_name);

        router = host
            .rest_prepare(&host_ctx, router)
            .map_err(|source| RegistryError::RestPrepare {
                module: host_name,
                source,
            })?;

        for e in &self.modules {
            if let Some(rest) = &e.rest {
                let ctx = base_ctx.clone().for_module(e.name);
                router = rest.register_rest(&ctx, router, &mut openapi).map_err(|source| {
                    RegistryError::RestRegister {
                        module: e.name,
                        source,
                    }
                })?;
            }
        }

        host.rest_finalize(&host_ctx, router, openapi)
            .map_err(|source| RegistryError::RestFinalize {
                module: host_name,
                source,
            })
    }

    pub async fn run_start_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        for e in &self.modules {
            if let Some(s) = &e.stateful {
                s.start(cancel.clone())
                    .await
                    .map_err(|source| RegistryError::Start {
                        module: e.name,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Reverse order; failures are logged and do not stop the remaining modules.
    pub async fn run_stop_phase(&self, cancel: CancellationToken) {
        for e in self.modules.iter().rev() {
            if let Some(s) = &e.stateful {
                if let Err(err) = s.stop(cancel.clone()).await {
                    tracing::warn!(module = e.name, error = %err, "Failed to stop module");
                }
            }
        }
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<ModuleEntry>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    pub fn register(mut self, entry: ModuleEntry) -> Self {
        if self.entries.iter().any(|e| e.name == entry.name) {
            self.errors
                .push(format!("Module '{}' is already registered", entry.name));
        } else {
            self.entries.push(entry);
        }
        self
    }

    /// Order modules so that every dependency precedes its dependents.
    /// Ties keep registration order.
    pub fn build(self) -> Result<ModuleRegistry, RegistryError> {
        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidRegistryConfiguration {
                errors: self.errors,
            });
        }

        let idx: HashMap<&'static str, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name, i))
            .collect();

        let mut dependents = vec![Vec::<usize>::new(); self.entries.len()];
        let mut indeg = vec![0usize; self.entries.len()];
        for (u, e) in self.entries.iter().enumerate() {
            for &d in e.deps {
                let v = *idx.get(d).ok_or_else(|| RegistryError::UnknownDependency {
                    module: e.name.to_string(),
                    depends_on: d.to_string(),
                })?;
                dependents[v].push(u);
                indeg[u] += 1;
            }
        }

        let mut q: VecDeque<usize> = (0..indeg.len()).filter(|&i| indeg[i] == 0).collect();
        let mut order = Vec::with_capacity(self.entries.len());
        while let Some(u) = q.pop_front() {
            order.push(u);
            for &w in &dependents[u] {
                indeg[w] -= 1;
                if indeg[w] == 0 {
                    q.push_back(w);
                }
            }
        }

        if order.len() != self.entries.len() {
            let stuck = (0..indeg.len())
                .filter(|&i| indeg[i] > 0)
                .map(|i| self.entries[i].name)
                .collect();
            return Err(RegistryError::CycleDetected { modules: stuck });
        }

        let mut slots: Vec<Option<ModuleEntry>> = self.entries.into_iter().map(Some).collect();
        let modules: Vec<ModuleEntry> = order.into_iter().filter_map(|i| slots[i].take()).collect();

        tracing::info!(
            modules = ?modules.iter().map(|e| e.name).collect::<Vec<_>>(),
            "Module dependency order resolved"
        );
        Ok(ModuleRegistry { modules })
    }
}

/// Structured errors for the module registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("initialization failed for module '{module}'")]
    Init {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("DB migration failed for module '{module}'")]
    DbMigrate {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST prepare failed for host module '{module}'")]
    RestPrepare {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST registration failed for module '{module}'")]
    RestRegister {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST finalize failed for host module '{module}'")]
    RestFinalize {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST phase requires an ingress host: modules with capability 'rest' found, but no module with 'rest_host'")]
    RestRequiresHost,
    #[error("multiple 'rest_host' modules detected; exactly one is allowed")]
    MultipleRestHosts,
    #[error("start failed for module '{module}'")]
    Start {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' depends on unknown '{depends_on}'")]
    UnknownDependency { module: String, depends_on: String },
    #[error("cyclic dependency among modules: {modules:?}")]
    CycleDetected { modules: Vec<&'static str> },
    #[error("invalid registry configuration: {errors:?}")]
    InvalidRegistryConfiguration { errors: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleCtxBuilder;
    use async_trait::async_trait;
    use axum::routing::get;
    use std::sync::Mutex;

    struct Tracer {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Tracer {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: log.clone(),
            })
        }

        fn note(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{what}:{}", self.name));
        }
    }

    #[async_trait]
    impl contracts::Module for Tracer {
        async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
            assert_eq!(ctx.current_module(), Some(self.name));
            self.note("init");
            Ok(())
        }
    }

    impl contracts::RestfulModule for Tracer {
        fn register_rest(
            &self,
            _ctx: &ModuleCtx,
            router: Router,
            _openapi: &mut OpenApi,
        ) -> anyhow::Result<Router> {
            self.note("rest");
            Ok(router.route(&format!("/{}", self.name), get(|| async { "ok" })))
        }
    }

    impl contracts::RestHostModule for Tracer {
        fn rest_prepare(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
            self.note("prepare");
            Ok(router)
        }

        fn rest_finalize(
            &self,
            _ctx: &ModuleCtx,
            router: Router,
            _openapi: OpenApi,
        ) -> anyhow::Result<Router> {
            self.note("finalize");
            Ok(router)
        }
    }

    #[async_trait]
    impl contracts::StatefulModule for Tracer {
        async fn start(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            self.note("start");
            Ok(())
        }
        async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            self.note("stop");
            Ok(())
        }
    }

    fn ctx() -> ModuleCtx {
        ModuleCtxBuilder::new(CancellationToken::new()).build()
    }

    fn empty_openapi() -> OpenApi {
        utoipa::openapi::OpenApiBuilder::new().build()
    }

    #[test]
    fn dependencies_come_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Tracer::new("a", &log);
        let b = Tracer::new("b", &log);
        let reg = ModuleRegistry::builder()
            .register(ModuleEntry::new("b", b).deps(&["a"]))
            .register(ModuleEntry::new("a", a))
            .build()
            .unwrap();
        let names: Vec<_> = reg.modules().iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = ModuleRegistry::builder()
            .register(ModuleEntry::new("b", Tracer::new("b", &log)).deps(&["ghost"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDependency { .. }));
    }

    #[test]
    fn cycles_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = ModuleRegistry::builder()
            .register(ModuleEntry::new("a", Tracer::new("a", &log)).deps(&["b"]))
            .register(ModuleEntry::new("b", Tracer::new("b", &log)).deps(&["a"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::CycleDetected { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = ModuleRegistry::builder()
            .register(ModuleEntry::new("a", Tracer::new("a", &log)))
            .register(ModuleEntry::new("a", Tracer::new("a", &log)))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidRegistryConfiguration { .. }
        ));
    }

    #[test]
    fn rest_without_host_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let m = Tracer::new("m", &log);
        let reg = ModuleRegistry::builder()
            .register(ModuleEntry::new("m", m.clone()).rest(m))
            .build()
            .unwrap();
        let err = reg
            .run_rest_phase(&ctx(), Router::new(), empty_openapi())
            .unwrap_err();
        assert!(matches!(err, RegistryError::RestRequiresHost));
    }

    #[tokio::test]
    async fn phases_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = Tracer::new("host", &log);
        let m = Tracer::new("m", &log);
        let reg = ModuleRegistry::builder()
            .register(
                ModuleEntry::new("host", host.clone())
                    .rest_host(host.clone())
                    .stateful(host),
            )
            .register(ModuleEntry::new("m", m.clone()).deps(&["host"]).rest(m))
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        reg.run_init_phase(&ctx()).await.unwrap();
        reg.run_rest_phase(&ctx(), Router::new(), empty_openapi())
            .unwrap();
        reg.run_start_phase(cancel.clone()).await.unwrap();
        reg.run_stop_phase(cancel).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "init:host",
                "init:m",
                "prepare:host",
                "rest:m",
                "finalize:host",
                "start:host",
                "stop:host"
            ]
        );
    }
}
