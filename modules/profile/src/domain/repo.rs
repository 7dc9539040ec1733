use crate::contract::model::Profile;
use async_trait::async_trait;

/// Port for the domain layer: persistence operations the domain needs.
/// Object-safe and async-friendly via `async_trait`.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Load the aggregate stored under `key`.
    async fn find(&self, key: &str) -> anyhow::Result<Option<Profile>>;
    /// Insert a fully-formed aggregate. Fails if `p.key` already exists.
    async fn insert(&self, p: Profile) -> anyhow::Result<()>;
    /// Overwrite the stored aggregate (by `p.key`), but only while the stored
    /// row is still at `expected_version`. Fails without writing otherwise.
    ///
    /// Service computes version/timestamps/validation; repo persists.
    async fn update(&self, p: Profile, expected_version: i64) -> anyhow::Result<()>;
}
