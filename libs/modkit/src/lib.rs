//! # ModKit
//!
//! Small kit shared by the server modules:
//!
//! - module contracts and an explicit registry driving the
//!   init → DB → REST → start → stop phases;
//! - RFC 9457 problem responses;
//! - broadcast primitives (`SseBroadcaster`, `RelayHub`);
//! - a traced outgoing HTTP client.
//!
//! ```rust,ignore
//! let registry = ModuleRegistry::builder()
//!     .register(ModuleEntry::new("api_ingress", ingress.clone()).rest_host(ingress.clone()))
//!     .register(ModuleEntry::new("profile", profile.clone()).deps(&["api_ingress"]).db(profile.clone()).rest(profile))
//!     .build()?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod api;
pub mod context;
pub mod contracts;
pub mod http;
pub mod registry;
pub mod shutdown;

pub use api::problem::{Problem, ProblemResponse, ValidationError, APPLICATION_PROBLEM_JSON};
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
pub use contracts::{DbModule, Module, RestHostModule, RestfulModule, StatefulModule};
pub use http::client::TracedClient;
pub use http::relay::{ConnectionId, RelayHub, RelayMember};
pub use http::sse::SseBroadcaster;
pub use registry::{ModuleEntry, ModuleRegistry, RegistryError};
