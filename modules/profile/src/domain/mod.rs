pub mod error;
pub mod events;
mod merge;
pub mod ports;
pub mod repo;
pub mod service;
