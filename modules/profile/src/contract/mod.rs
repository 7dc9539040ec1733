pub mod client;
pub mod error;
pub mod model;
pub mod view;

pub use client::ProfileApi;
pub use error::ProfileError;
pub use model::*;
pub use view::{ApplyOutcome, ProfileView, ProfileViewState, Section};
