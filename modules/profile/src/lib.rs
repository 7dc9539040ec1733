// === PUBLIC CONTRACT ===
pub mod contract;

pub use contract::{client, error, model, view};

// === MODULE DEFINITION ===
pub mod module;
pub use module::ProfileModule;

// === INTERNAL MODULES ===
// Exposed for tests and the server binary; other crates should stick to `contract`.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod gateways;
#[doc(hidden)]
pub mod infra;
