use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::contract::{
    client::ProfileApi,
    error::ProfileError,
    model::{Collection, EntryPatch, NewEntry, Profile, ProfilePatch, SkillInput},
};
use modkit::{Problem, TracedClient};

/// What a call addresses, used to rebuild not-found errors.
enum Target<'a> {
    Profile,
    Entry(Collection, Uuid),
    Skill(&'a str),
}

/// [`ProfileApi`] over the REST surface of a running profile server.
///
/// `base` is the API root, e.g. `http://127.0.0.1:5000/api`. The last
/// aggregate seen is kept so `get_or_create` can still answer while the
/// server is unreachable.
pub struct RemoteProfileClient {
    client: TracedClient,
    base: Url,
    profile_key: String,
    last_known: Mutex<Option<Profile>>,
}

impl RemoteProfileClient {
    pub fn new(client: TracedClient, base: Url, profile_key: impl Into<String>) -> Self {
        Self {
            client,
            base,
            profile_key: profile_key.into(),
            last_known: Mutex::new(None),
        }
    }

    /// Most recent aggregate returned by the server, if any.
    pub fn last_known(&self) -> Option<Profile> {
        self.last_known.lock().clone()
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProfileError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProfileError::validation(format!("invalid base URL {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<Profile, ProfileError> {
        let url = self.url(segments)?;
        let mut req = self.client.request(method.clone(), url.as_str());
        if let Some(body) = body {
            req = req.json(body);
        }
        let req = req
            .build()
            .map_err(|e| ProfileError::validation(e.to_string()))?;

        let response = self
            .client
            .execute(req)
            .await
            .map_err(|e| ProfileError::upstream(format!("{method} {}: {e}", url.path())))?;

        let status = response.status();
        if !status.is_success() {
            let problem = response.json::<Problem>().await.ok();
            return Err(self.error_for(status, problem, target));
        }

        let profile = response
            .json::<Profile>()
            .await
            .map_err(|e| ProfileError::upstream(format!("decode profile: {e}")))?;
        self.remember(&profile);
        Ok(profile)
    }

    /// Responses to overlapping calls can arrive out of order; an older
    /// version never replaces a newer copy.
    fn remember(&self, profile: &Profile) {
        let mut last = self.last_known.lock();
        match last.as_ref() {
            Some(known) if known.version > profile.version => {}
            _ => *last = Some(profile.clone()),
        }
    }

    fn error_for(
        &self,
        status: StatusCode,
        problem: Option<Problem>,
        target: Target<'_>,
    ) -> ProfileError {
        let code = problem.as_ref().map(|p| p.code.as_str()).unwrap_or_default();
        let detail = problem
            .as_ref()
            .map(|p| p.detail.clone())
            .unwrap_or_else(|| format!("HTTP {status}"));

        match (status, code, target) {
            (StatusCode::NOT_FOUND, "PROFILE_ENTRY_NOT_FOUND", Target::Entry(collection, id)) => {
                ProfileError::EntryNotFound { collection, id }
            }
            (StatusCode::NOT_FOUND, "PROFILE_SKILL_NOT_FOUND", Target::Skill(name)) => {
                ProfileError::SkillNotFound { name: name.to_owned() }
            }
            (StatusCode::NOT_FOUND, _, _) => ProfileError::not_found(self.profile_key.clone()),
            (s, _, _) if s.is_client_error() => ProfileError::validation(detail),
            (s, _, _) if s.is_server_error() => ProfileError::upstream(detail),
            _ => ProfileError::internal(),
        }
    }

    fn entry_segment(collection: Collection) -> &'static str {
        match collection {
            Collection::Experience => "experience",
            Collection::Education => "education",
            Collection::Certifications => "certification",
        }
    }
}

#[async_trait]
impl ProfileApi for RemoteProfileClient {
    #[instrument(name = "profile.http.get_or_create", skip_all, fields(base = %self.base))]
    async fn get_or_create(&self) -> Result<Profile, ProfileError> {
        let res = self
            .call::<()>(Method::GET, &["profile", &self.profile_key], None, Target::Profile)
            .await;
        match res {
            Err(ProfileError::UpstreamUnavailable { message }) => match self.last_known() {
                Some(cached) => {
                    warn!(error = %message, version = cached.version, "profile server unreachable; serving last known copy");
                    Ok(cached)
                }
                None => Err(ProfileError::UpstreamUnavailable { message }),
            },
            other => other,
        }
    }

    #[instrument(name = "profile.http.replace", skip_all, fields(base = %self.base))]
    async fn replace(&self, patch: ProfilePatch) -> Result<Profile, ProfileError> {
        self.call(
            Method::PUT,
            &["profile", &self.profile_key],
            Some(&patch),
            Target::Profile,
        )
        .await
    }

    #[instrument(name = "profile.http.add_nested_item", skip_all, fields(collection = %entry.collection()))]
    async fn add_nested_item(&self, entry: NewEntry) -> Result<Profile, ProfileError> {
        let segment = Self::entry_segment(entry.collection());
        match &entry {
            NewEntry::Experience(e) => {
                self.call(Method::POST, &["profile", segment], Some(e), Target::Profile)
                    .await
            }
            NewEntry::Education(e) => {
                self.call(Method::POST, &["profile", segment], Some(e), Target::Profile)
                    .await
            }
            NewEntry::Certification(e) => {
                self.call(Method::POST, &["profile", segment], Some(e), Target::Profile)
                    .await
            }
        }
    }

    #[instrument(name = "profile.http.update_nested_item", skip_all, fields(collection = %patch.collection(), id = %id))]
    async fn update_nested_item(
        &self,
        id: Uuid,
        patch: EntryPatch,
    ) -> Result<Profile, ProfileError> {
        let collection = patch.collection();
        let id_str = id.to_string();
        let segments = ["profile", Self::entry_segment(collection), id_str.as_str()];
        let target = Target::Entry(collection, id);
        match &patch {
            EntryPatch::Experience(p) => self.call(Method::PUT, &segments, Some(p), target).await,
            EntryPatch::Education(p) => self.call(Method::PUT, &segments, Some(p), target).await,
            EntryPatch::Certification(p) => {
                self.call(Method::PUT, &segments, Some(p), target).await
            }
        }
    }

    #[instrument(name = "profile.http.remove_nested_item", skip_all, fields(collection = %collection, id = %id))]
    async fn remove_nested_item(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Profile, ProfileError> {
        let id_str = id.to_string();
        self.call::<()>(
            Method::DELETE,
            &["profile", Self::entry_segment(collection), &id_str],
            None,
            Target::Entry(collection, id),
        )
        .await
    }

    #[instrument(name = "profile.http.endorse_skill", skip_all, fields(skill = %name))]
    async fn endorse_skill(&self, name: &str) -> Result<Profile, ProfileError> {
        self.call::<()>(
            Method::POST,
            &["profile", "endorse", name],
            None,
            Target::Skill(name),
        )
        .await
    }

    #[instrument(name = "profile.http.replace_skills", skip_all, fields(count = skills.len()))]
    async fn replace_skills(&self, skills: Vec<SkillInput>) -> Result<Profile, ProfileError> {
        self.call(
            Method::POST,
            &["profile", "skills"],
            Some(&skills),
            Target::Profile,
        )
        .await
    }

    #[instrument(name = "profile.http.remove_skill", skip_all, fields(skill = %name))]
    async fn remove_skill(&self, name: &str) -> Result<Profile, ProfileError> {
        self.call::<()>(
            Method::DELETE,
            &["profile", "skills", name],
            None,
            Target::Skill(name),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RemoteProfileClient {
        RemoteProfileClient::new(TracedClient::default(), Url::parse(base).unwrap(), "demo")
    }

    #[test]
    fn urls_are_built_from_segments() {
        let c = client("http://localhost:5000/api/");
        let url = c.url(&["profile", "endorse", "Node JS"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/profile/endorse/Node%20JS"
        );

        let c = client("http://localhost:5000/api");
        assert_eq!(
            c.url(&["profile", "demo"]).unwrap().as_str(),
            "http://localhost:5000/api/profile/demo"
        );
    }

    #[test]
    fn statuses_map_to_contract_errors() {
        let c = client("http://localhost:5000/api");
        let id = Uuid::new_v4();

        let e = c.error_for(
            StatusCode::NOT_FOUND,
            Some(Problem::new(StatusCode::NOT_FOUND, "gone").with_code("PROFILE_ENTRY_NOT_FOUND")),
            Target::Entry(Collection::Education, id),
        );
        assert_eq!(
            e,
            ProfileError::EntryNotFound {
                collection: Collection::Education,
                id
            }
        );

        let e = c.error_for(StatusCode::NOT_FOUND, None, Target::Profile);
        assert_eq!(e, ProfileError::not_found("demo"));

        let e = c.error_for(
            StatusCode::BAD_REQUEST,
            Some(Problem::new(StatusCode::BAD_REQUEST, "bio: too long")),
            Target::Profile,
        );
        assert_eq!(e, ProfileError::validation("bio: too long"));

        let e = c.error_for(StatusCode::INTERNAL_SERVER_ERROR, None, Target::Profile);
        assert!(matches!(e, ProfileError::UpstreamUnavailable { .. }));
    }
}
