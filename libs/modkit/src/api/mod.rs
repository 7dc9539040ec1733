//! HTTP API helpers shared by modules.

pub mod problem;
