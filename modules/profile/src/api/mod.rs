pub mod relay;
pub mod rest;
