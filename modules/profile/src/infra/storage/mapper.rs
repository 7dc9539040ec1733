use anyhow::Context;

use crate::contract::model::Profile;
use crate::infra::storage::entity::Model as ProfileRow;

/// Row columns are authoritative for key, version and timestamp.
impl TryFrom<ProfileRow> for Profile {
    type Error = anyhow::Error;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let mut profile: Profile = serde_json::from_value(row.document)
            .with_context(|| format!("corrupt profile document '{}'", row.id))?;
        profile.key = row.id;
        profile.version = row.version;
        profile.updated_at = row.updated_at;
        Ok(profile)
    }
}

pub fn to_document(p: &Profile) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(p).context("serialize profile document")
}
