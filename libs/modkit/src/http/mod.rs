//! HTTP utilities for modkit: outgoing client, SSE and relay fan-out.

pub mod client;
pub mod relay;
pub mod sse;
