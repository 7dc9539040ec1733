use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::contract::{
    client::ProfileApi,
    error::ProfileError,
    model::{Collection, EntryPatch, NewEntry, Profile, ProfilePatch, SkillInput},
};
use crate::domain::service::Service;

/// In-process [`ProfileApi`] backed by the domain service.
pub struct ProfileLocalClient {
    service: Arc<Service>,
}

impl ProfileLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProfileApi for ProfileLocalClient {
    async fn get_or_create(&self) -> Result<Profile, ProfileError> {
        self.service.get_or_create().await.map_err(Into::into)
    }

    async fn replace(&self, patch: ProfilePatch) -> Result<Profile, ProfileError> {
        self.service.replace(patch).await.map_err(Into::into)
    }

    async fn add_nested_item(&self, entry: NewEntry) -> Result<Profile, ProfileError> {
        self.service.add_nested_item(entry).await.map_err(Into::into)
    }

    async fn update_nested_item(
        &self,
        id: Uuid,
        patch: EntryPatch,
    ) -> Result<Profile, ProfileError> {
        self.service
            .update_nested_item(id, patch)
            .await
            .map_err(Into::into)
    }

    async fn remove_nested_item(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Profile, ProfileError> {
        self.service
            .remove_nested_item(collection, id)
            .await
            .map_err(Into::into)
    }

    async fn endorse_skill(&self, name: &str) -> Result<Profile, ProfileError> {
        self.service.endorse_skill(name).await.map_err(Into::into)
    }

    async fn replace_skills(&self, skills: Vec<SkillInput>) -> Result<Profile, ProfileError> {
        self.service.replace_skills(skills).await.map_err(Into::into)
    }

    async fn remove_skill(&self, name: &str) -> Result<Profile, ProfileError> {
        self.service.remove_skill(name).await.map_err(Into::into)
    }
}
