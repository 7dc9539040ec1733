use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::{
    error::ProfileError,
    model::{Collection, EntryPatch, NewEntry, Profile, ProfilePatch, SkillInput},
};

/// Public API of the profile module, implemented in-process and over HTTP.
///
/// Every mutation returns the authoritative aggregate after the write.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch the aggregate, creating it with defaults on first use.
    async fn get_or_create(&self) -> Result<Profile, ProfileError>;

    /// Merge top-level fields; absent fields stay untouched.
    async fn replace(&self, patch: ProfilePatch) -> Result<Profile, ProfileError>;

    async fn add_nested_item(&self, entry: NewEntry) -> Result<Profile, ProfileError>;

    async fn update_nested_item(&self, id: Uuid, patch: EntryPatch)
        -> Result<Profile, ProfileError>;

    /// Succeeds with the unchanged aggregate when `id` is unknown.
    async fn remove_nested_item(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Profile, ProfileError>;

    async fn endorse_skill(&self, name: &str) -> Result<Profile, ProfileError>;

    async fn replace_skills(&self, skills: Vec<SkillInput>) -> Result<Profile, ProfileError>;

    async fn remove_skill(&self, name: &str) -> Result<Profile, ProfileError>;
}
