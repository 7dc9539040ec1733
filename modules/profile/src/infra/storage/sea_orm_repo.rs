//! SeaORM-backed repository implementation for the domain port.
//!
//! Generic over `C: ConnectionTrait`, so it can run on a `DatabaseConnection`
//! or inside a transaction.

use anyhow::{anyhow, Context};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::contract::model::Profile;
use crate::domain::repo::ProfileRepository;
use crate::infra::storage::entity::{
    ActiveModel as ProfileAM, Column as ProfileColumn, Entity as ProfileEntity,
};
use crate::infra::storage::mapper::to_document;

/// SeaORM repository impl.
/// Holds a connection object; its lifetime/ownership is up to the caller.
pub struct SeaOrmProfileRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmProfileRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> ProfileRepository for SeaOrmProfileRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn find(&self, key: &str) -> anyhow::Result<Option<Profile>> {
        let found = ProfileEntity::find_by_id(key.to_owned())
            .one(&self.conn)
            .await
            .context("find failed")?;
        found.map(Profile::try_from).transpose()
    }

    async fn insert(&self, p: Profile) -> anyhow::Result<()> {
        let m = ProfileAM {
            id: Set(p.key.clone()),
            document: Set(to_document(&p)?),
            version: Set(p.version),
            created_at: Set(p.updated_at),
            updated_at: Set(p.updated_at),
        };
        let _ = m.insert(&self.conn).await.context("insert failed")?;
        Ok(())
    }

    async fn update(&self, p: Profile, expected_version: i64) -> anyhow::Result<()> {
        // created_at stays as inserted
        let m = ProfileAM {
            id: Set(p.key.clone()),
            document: Set(to_document(&p)?),
            version: Set(p.version),
            updated_at: Set(p.updated_at),
            ..Default::default()
        };
        match ProfileEntity::update(m)
            .filter(ProfileColumn::Version.eq(expected_version))
            .exec(&self.conn)
            .await
        {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(anyhow!(
                "version conflict: '{}' is no longer at version {expected_version}",
                p.key
            )),
            Err(e) => Err(anyhow::Error::new(e).context("update failed")),
        }
    }
}
