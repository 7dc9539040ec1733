use std::sync::Arc;

use crate::contract::model::{
    Collection, EntryPatch, NewEntry, Profile, ProfilePatch, SkillInput, Socials,
};
use crate::domain::error::DomainError;
use crate::domain::events::ProfileDomainEvent;
use crate::domain::merge;
use crate::domain::ports::{AvatarStore, EventPublisher};
use crate::domain::repo::ProfileRepository;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Domain service owning every read-modify-write of the profile aggregate.
/// Depends only on ports, not on infra types.
///
/// Mutations hold `write_lock` from load to commit, so clones of one service
/// never interleave their read-modify-writes.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn ProfileRepository>,
    write_lock: Arc<Mutex<()>>,
    events: Arc<dyn EventPublisher<ProfileDomainEvent>>,
    avatars: Arc<dyn AvatarStore>,
    config: ServiceConfig,
}

/// Configuration for the domain service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub profile_key: String,
    pub max_bio_length: usize,
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            profile_key: "demo".to_string(),
            max_bio_length: 500,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Service {
    /// Create a service with dependencies.
    pub fn new(
        repo: Arc<dyn ProfileRepository>,
        events: Arc<dyn EventPublisher<ProfileDomainEvent>>,
        avatars: Arc<dyn AvatarStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repo,
            write_lock: Arc::new(Mutex::new(())),
            events,
            avatars,
            config,
        }
    }

    pub fn profile_key(&self) -> &str {
        &self.config.profile_key
    }

    /// Only the configured key names an aggregate.
    pub fn ensure_key(&self, key: &str) -> Result<(), DomainError> {
        if key == self.config.profile_key {
            Ok(())
        } else {
            Err(DomainError::profile_not_found(key))
        }
    }

    #[instrument(name = "profile.service.get_or_create", skip(self), fields(key = %self.config.profile_key))]
    pub async fn get_or_create(&self) -> Result<Profile, DomainError> {
        if let Some(profile) = self.find().await? {
            debug!(version = profile.version, "Found profile");
            return Ok(profile);
        }
        let _guard = self.write_lock.lock().await;
        if let Some(profile) = self.find().await? {
            return Ok(profile);
        }
        self.create(merge::default_profile(&self.config.profile_key, Utc::now()))
            .await
    }

    /// Shallow merge of top-level fields; creates the aggregate first if absent.
    #[instrument(name = "profile.service.replace", skip(self, patch), fields(key = %self.config.profile_key))]
    pub async fn replace(&self, patch: ProfilePatch) -> Result<Profile, DomainError> {
        self.validate_patch(&patch)?;

        let _guard = self.write_lock.lock().await;
        let Some(mut profile) = self.find().await? else {
            let mut fresh = merge::default_profile(&self.config.profile_key, Utc::now());
            merge::apply_patch(&mut fresh, patch);
            return self.create(fresh).await;
        };

        if !merge::apply_patch(&mut profile, patch) {
            debug!("Patch changes nothing");
            return Ok(profile);
        }
        self.commit(profile).await
    }

    #[instrument(
        name = "profile.service.add_nested_item",
        skip(self, entry),
        fields(collection = %entry.collection())
    )]
    pub async fn add_nested_item(&self, entry: NewEntry) -> Result<Profile, DomainError> {
        self.validate_new_entry(&entry)?;
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        let id = merge::add_entry(&mut profile, entry);
        info!(%id, "Added entry");
        self.commit(profile).await
    }

    #[instrument(
        name = "profile.service.update_nested_item",
        skip(self, patch),
        fields(collection = %patch.collection(), entry_id = %id)
    )]
    pub async fn update_nested_item(
        &self,
        id: Uuid,
        patch: EntryPatch,
    ) -> Result<Profile, DomainError> {
        self.validate_entry_patch(&patch)?;
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        if !merge::update_entry(&mut profile, id, patch)? {
            return Ok(profile);
        }
        self.commit(profile).await
    }

    /// Removing an id that is not there returns the aggregate untouched.
    #[instrument(
        name = "profile.service.remove_nested_item",
        skip(self),
        fields(collection = %collection, entry_id = %id)
    )]
    pub async fn remove_nested_item(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Profile, DomainError> {
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        if !merge::remove_entry(&mut profile, collection, id) {
            debug!("No such entry; nothing removed");
            return Ok(profile);
        }
        self.commit(profile).await
    }

    #[instrument(name = "profile.service.endorse_skill", skip(self), fields(skill = %name))]
    pub async fn endorse_skill(&self, name: &str) -> Result<Profile, DomainError> {
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        let count = merge::endorse(&mut profile, name)?;
        info!(endorsements = count, "Skill endorsed");
        self.commit(profile).await
    }

    #[instrument(name = "profile.service.replace_skills", skip(self, skills), fields(count = skills.len()))]
    pub async fn replace_skills(&self, skills: Vec<SkillInput>) -> Result<Profile, DomainError> {
        Self::validate_skills(&skills)?;
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        if !merge::replace_skills(&mut profile, skills) {
            return Ok(profile);
        }
        self.commit(profile).await
    }

    #[instrument(name = "profile.service.remove_skill", skip(self), fields(skill = %name))]
    pub async fn remove_skill(&self, name: &str) -> Result<Profile, DomainError> {
        let _guard = self.write_lock.lock().await;
        let mut profile = self.load().await?;
        if !merge::remove_skill(&mut profile, name) {
            return Ok(profile);
        }
        self.commit(profile).await
    }

    /// Stores the bytes and returns the public URL. The aggregate is not touched;
    /// clients follow up with a `replace` carrying the new `avatarUrl`.
    #[instrument(name = "profile.service.upload_avatar", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, DomainError> {
        if bytes.is_empty() {
            return Err(DomainError::upload("uploaded file is empty"));
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(DomainError::upload(format!(
                "file is {} bytes (max: {})",
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }
        let url = self.avatars.store(original_name, bytes).await?;
        info!(%url, "Avatar stored");
        Ok(url)
    }

    async fn find(&self) -> Result<Option<Profile>, DomainError> {
        self.repo
            .find(&self.config.profile_key)
            .await
            .map_err(|e| DomainError::database(e.to_string()))
    }

    async fn load(&self) -> Result<Profile, DomainError> {
        self.find()
            .await?
            .ok_or_else(|| DomainError::profile_not_found(&self.config.profile_key))
    }

    async fn create(&self, profile: Profile) -> Result<Profile, DomainError> {
        if let Err(e) = self.repo.insert(profile.clone()).await {
            // a concurrent first read may have inserted it already
            if let Some(existing) = self.find().await? {
                warn!("Lost create race; using stored profile");
                return Ok(existing);
            }
            return Err(DomainError::database(e.to_string()));
        }

        self.events.publish(&ProfileDomainEvent::Created {
            key: profile.key.clone(),
            version: profile.version,
            at: profile.updated_at,
        });
        info!("Created profile with defaults");
        Ok(profile)
    }

    /// Callers hold `write_lock`.
    async fn commit(&self, mut profile: Profile) -> Result<Profile, DomainError> {
        let expected = profile.version;
        profile.version += 1;
        profile.updated_at = Utc::now();

        self.repo
            .update(profile.clone(), expected)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;

        self.events.publish(&ProfileDomainEvent::Changed {
            key: profile.key.clone(),
            version: profile.version,
            at: profile.updated_at,
        });
        debug!(version = profile.version, "Persisted profile");
        Ok(profile)
    }

    fn validate_patch(&self, patch: &ProfilePatch) -> Result<(), DomainError> {
        if let Some(bio) = &patch.bio {
            let len = bio.chars().count();
            if len > self.config.max_bio_length {
                return Err(DomainError::validation(
                    "bio",
                    format!("{len} characters (max: {})", self.config.max_bio_length),
                ));
            }
        }
        if let Some(email) = &patch.email {
            if !email.is_empty() && !email.contains('@') {
                return Err(DomainError::validation("email", format!("'{email}' is not an email address")));
            }
        }
        if let Some(socials) = &patch.socials {
            Self::validate_socials(socials)?;
        }
        if let Some(skills) = &patch.skills {
            Self::validate_skills(skills)?;
        }
        Ok(())
    }

    fn validate_socials(socials: &Socials) -> Result<(), DomainError> {
        for (platform, link) in socials.linked() {
            if url::Url::parse(link.trim()).is_err() {
                return Err(DomainError::validation(
                    format!("socials.{}", platform.as_str()),
                    format!("'{link}' is not an absolute URL"),
                ));
            }
        }
        Ok(())
    }

    fn validate_skills(skills: &[SkillInput]) -> Result<(), DomainError> {
        if skills.iter().any(|s| s.name.trim().is_empty()) {
            return Err(DomainError::validation("skills.name", "skill name cannot be empty"));
        }
        Ok(())
    }

    fn validate_new_entry(&self, entry: &NewEntry) -> Result<(), DomainError> {
        match entry {
            NewEntry::Experience(e) => {
                require("experience.role", &e.role)?;
                require("experience.company", &e.company)
            }
            NewEntry::Education(e) => {
                require("education.college", &e.college)?;
                require("education.degree", &e.degree)?;
                require("education.field", &e.field)
            }
            NewEntry::Certification(c) => {
                require("certifications.name", &c.name)?;
                require("certifications.provider", &c.provider)
            }
        }
    }

    /// A patch may omit required fields but not blank them.
    fn validate_entry_patch(&self, patch: &EntryPatch) -> Result<(), DomainError> {
        let set = |field: &str, v: &Option<String>| match v {
            Some(v) => require(field, v),
            None => Ok(()),
        };
        match patch {
            EntryPatch::Experience(p) => {
                set("experience.role", &p.role)?;
                set("experience.company", &p.company)
            }
            EntryPatch::Education(p) => {
                set("education.college", &p.college)?;
                set("education.degree", &p.degree)?;
                set("education.field", &p.field)
            }
            EntryPatch::Certification(p) => {
                set("certifications.name", &p.name)?;
                set("certifications.provider", &p.provider)
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::{ExperiencePatch, NewCertification, NewExperience};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemRepo {
        rows: Mutex<HashMap<String, Profile>>,
        writes: Mutex<usize>,
    }

    #[async_trait]
    impl ProfileRepository for MemRepo {
        async fn find(&self, key: &str) -> anyhow::Result<Option<Profile>> {
            Ok(self.rows.lock().get(key).cloned())
        }
        async fn insert(&self, p: Profile) -> anyhow::Result<()> {
            let mut rows = self.rows.lock();
            anyhow::ensure!(!rows.contains_key(&p.key), "duplicate key");
            rows.insert(p.key.clone(), p);
            *self.writes.lock() += 1;
            Ok(())
        }
        async fn update(&self, p: Profile, expected_version: i64) -> anyhow::Result<()> {
            // yield between the version check and the write, like a real round-trip
            tokio::task::yield_now().await;
            let mut rows = self.rows.lock();
            let stored = rows.get(&p.key).map(|row| row.version);
            anyhow::ensure!(stored == Some(expected_version), "version conflict");
            rows.insert(p.key.clone(), p);
            *self.writes.lock() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProfileDomainEvent>>);

    impl EventPublisher<ProfileDomainEvent> for Recorder {
        fn publish(&self, event: &ProfileDomainEvent) {
            self.0.lock().push(event.clone());
        }
    }

    struct FakeAvatars;

    #[async_trait]
    impl AvatarStore for FakeAvatars {
        async fn store(&self, original_name: Option<&str>, _bytes: &[u8]) -> Result<String, DomainError> {
            Ok(format!("/uploads/{}", original_name.unwrap_or("blob")))
        }
    }

    struct Fixture {
        svc: Service,
        repo: Arc<MemRepo>,
        events: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemRepo::default());
        let events = Arc::new(Recorder::default());
        let svc = Service::new(
            repo.clone(),
            events.clone(),
            Arc::new(FakeAvatars),
            ServiceConfig::default(),
        );
        Fixture { svc, repo, events }
    }

    fn experience(role: &str) -> NewEntry {
        NewEntry::Experience(NewExperience {
            role: role.into(),
            company: "Acme".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let f = fixture();
        let a = f.svc.get_or_create().await.unwrap();
        let b = f.svc.get_or_create().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(*f.repo.writes.lock(), 1);
        assert!(matches!(
            f.events.0.lock().as_slice(),
            [ProfileDomainEvent::Created { version: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn nested_ops_need_an_aggregate() {
        let f = fixture();
        let err = f.svc.add_nested_item(experience("Dev")).await.unwrap_err();
        assert!(matches!(err, DomainError::ProfileNotFound { .. }));
        let err = f.svc.endorse_skill("React").await.unwrap_err();
        assert!(matches!(err, DomainError::ProfileNotFound { .. }));
    }

    #[tokio::test]
    async fn replace_creates_when_absent() {
        let f = fixture();
        let p = f
            .svc
            .replace(ProfilePatch {
                name: Some("Ada".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.title, "Final Year Student");
        assert_eq!(p.version, 1);
    }

    #[tokio::test]
    async fn every_mutation_bumps_version_and_publishes() {
        let f = fixture();
        f.svc.get_or_create().await.unwrap();
        let p = f.svc.add_nested_item(experience("Dev")).await.unwrap();
        assert_eq!(p.version, 2);
        let id = p.experience[0].id;
        let p = f
            .svc
            .update_nested_item(
                id,
                EntryPatch::Experience(ExperiencePatch {
                    company: Some("Initech".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(p.version, 3);
        let p = f.svc.remove_nested_item(Collection::Experience, id).await.unwrap();
        assert_eq!(p.version, 4);

        let versions: Vec<i64> = f.events.0.lock().iter().map(|e| e.version()).collect();
        assert_eq!(versions, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn no_op_requests_do_not_write() {
        let f = fixture();
        let created = f.svc.get_or_create().await.unwrap();
        let p = f
            .svc
            .remove_nested_item(Collection::Experience, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(p, created);
        let p = f.svc.remove_skill("Cobol").await.unwrap();
        assert_eq!(p.version, 1);
        assert_eq!(*f.repo.writes.lock(), 1);
    }

    #[tokio::test]
    async fn endorse_twice_adds_two_despite_interleaving() {
        let f = fixture();
        f.svc.get_or_create().await.unwrap();
        f.svc.endorse_skill("React").await.unwrap();
        f.svc.add_nested_item(experience("Dev")).await.unwrap();
        let p = f.svc.endorse_skill("React").await.unwrap();
        assert_eq!(p.skill("React").unwrap().endorsements, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_all_land_with_distinct_versions() {
        let f = fixture();
        f.svc.get_or_create().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let svc = f.svc.clone();
            tasks.push(tokio::spawn(async move {
                svc.endorse_skill("React").await.unwrap().version
            }));
            let svc = f.svc.clone();
            tasks.push(tokio::spawn(async move {
                svc.add_nested_item(experience(&format!("Dev {i}")))
                    .await
                    .unwrap()
                    .version
            }));
        }
        let mut versions = Vec::new();
        for t in tasks {
            versions.push(t.await.unwrap());
        }
        versions.sort_unstable();
        assert_eq!(versions, (2..=17).collect::<Vec<i64>>());

        let p = f.svc.get_or_create().await.unwrap();
        assert_eq!(p.skill("React").unwrap().endorsements, 8);
        assert_eq!(p.experience.len(), 8);
        assert_eq!(p.version, 17);
        assert_eq!(f.events.0.lock().len(), 17);
    }

    #[tokio::test]
    async fn stale_write_is_refused_by_the_store() {
        let repo = MemRepo::default();
        let p = merge::default_profile("demo", Utc::now());
        repo.insert(p.clone()).await.unwrap();

        let mut next = p.clone();
        next.version = 2;
        repo.update(next.clone(), 1).await.unwrap();
        assert!(repo.update(next, 1).await.is_err());
        assert_eq!(repo.rows.lock()["demo"].version, 2);
    }

    #[tokio::test]
    async fn unknown_skill_cannot_be_endorsed() {
        let f = fixture();
        f.svc.get_or_create().await.unwrap();
        let err = f.svc.endorse_skill("Haskell").await.unwrap_err();
        assert!(matches!(err, DomainError::SkillNotFound { name } if name == "Haskell"));
    }

    #[tokio::test]
    async fn validation_rejects_before_storage() {
        let f = fixture();
        f.svc.get_or_create().await.unwrap();

        let long_bio = ProfilePatch {
            bio: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(matches!(
            f.svc.replace(long_bio).await,
            Err(DomainError::Validation { field, .. }) if field == "bio"
        ));

        let bad_link = ProfilePatch {
            socials: Some(Socials {
                github: "not a url".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(f.svc.replace(bad_link).await.is_err());

        let no_provider = NewEntry::Certification(NewCertification {
            name: "CKA".into(),
            ..Default::default()
        });
        assert!(matches!(
            f.svc.add_nested_item(no_provider).await,
            Err(DomainError::Validation { field, .. }) if field == "certifications.provider"
        ));

        let blank_role = EntryPatch::Experience(ExperiencePatch {
            role: Some("  ".into()),
            ..Default::default()
        });
        assert!(f.svc.update_nested_item(Uuid::new_v4(), blank_role).await.is_err());

        assert!(f.svc.replace_skills(vec![SkillInput::from("")]).await.is_err());
        assert_eq!(*f.repo.writes.lock(), 1);
    }

    #[tokio::test]
    async fn upload_limits_are_enforced() {
        let f = fixture();
        assert!(matches!(
            f.svc.upload_avatar(Some("a.png"), b"").await,
            Err(DomainError::Upload { .. })
        ));
        let big = vec![0u8; ServiceConfig::default().max_upload_bytes + 1];
        assert!(f.svc.upload_avatar(Some("a.png"), &big).await.is_err());
        assert_eq!(
            f.svc.upload_avatar(Some("a.png"), b"png").await.unwrap(),
            "/uploads/a.png"
        );
    }

    #[test]
    fn only_the_configured_key_exists() {
        let f = fixture();
        assert!(f.svc.ensure_key("demo").is_ok());
        assert!(matches!(
            f.svc.ensure_key("someone-else"),
            Err(DomainError::ProfileNotFound { key }) if key == "someone-else"
        ));
    }
}
