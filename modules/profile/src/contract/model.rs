use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The profile aggregate: identity fields plus the nested collections it owns.
///
/// Serde derives here describe the stored document and the wire shape seen
/// by remote clients (camelCase, identifiers as `_id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub key: String,
    pub name: String,
    pub title: String,
    pub bio: String,
    pub email: String,
    pub location: String,
    pub image: String,
    pub avatar_url: String,
    pub skills: Vec<Skill>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub certifications: Vec<Certification>,
    pub socials: Socials,
    /// Bumped by the store on every persisted mutation.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub endorsements: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub role: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub join_date: String,
    #[serde(default)]
    pub leave_date: String,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub college: String,
    pub degree: String,
    pub field: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub certificate_url: String,
    #[serde(default)]
    pub certificate_id: String,
    #[serde(default)]
    pub issued_date: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub description: String,
}

/// Social links; an empty value means "not set". Unknown platforms do not deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Socials {
    pub github: String,
    pub linkedin: String,
    pub instagram: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Github,
    Linkedin,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Github, Platform::Linkedin, Platform::Instagram];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
        }
    }
}

impl Socials {
    pub fn get(&self, platform: Platform) -> Option<&str> {
        let v = match platform {
            Platform::Github => &self.github,
            Platform::Linkedin => &self.linkedin,
            Platform::Instagram => &self.instagram,
        };
        (!v.trim().is_empty()).then_some(v.as_str())
    }

    /// Platforms with a link, in `Platform::ALL` order.
    pub fn linked(&self) -> impl Iterator<Item = (Platform, &str)> {
        Platform::ALL
            .into_iter()
            .filter_map(|p| self.get(p).map(|url| (p, url)))
    }
}

/// Nested collections addressed by entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Experience,
    Education,
    Certifications,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Experience => "experience",
            Collection::Education => "education",
            Collection::Certifications => "certifications",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewExperience {
    pub role: String,
    pub company: String,
    pub location: String,
    pub join_date: String,
    pub leave_date: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewEducation {
    pub college: String,
    pub degree: String,
    pub field: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewCertification {
    pub name: String,
    pub provider: String,
    pub certificate_url: String,
    pub certificate_id: String,
    pub issued_date: String,
    pub expiry_date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExperiencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EducationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A new entry for one of the id-addressed collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewEntry {
    Experience(NewExperience),
    Education(NewEducation),
    Certification(NewCertification),
}

impl NewEntry {
    pub fn collection(&self) -> Collection {
        match self {
            NewEntry::Experience(_) => Collection::Experience,
            NewEntry::Education(_) => Collection::Education,
            NewEntry::Certification(_) => Collection::Certifications,
        }
    }
}

/// Shallow patch for an existing entry; `None` fields stay as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPatch {
    Experience(ExperiencePatch),
    Education(EducationPatch),
    Certification(CertificationPatch),
}

impl EntryPatch {
    pub fn collection(&self) -> Collection {
        match self {
            EntryPatch::Experience(_) => Collection::Experience,
            EntryPatch::Education(_) => Collection::Education,
            EntryPatch::Certification(_) => Collection::Certifications,
        }
    }
}

/// Incoming skill for a bulk replacement. Endorsements are never client-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInput {
    pub name: String,
}

impl From<&str> for SkillInput {
    fn from(name: &str) -> Self {
        Self { name: name.into() }
    }
}

/// Top-level merge. Absent fields are left untouched; nested collections
/// other than `skills` are not part of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socials: Option<Socials>,
    /// Applied with bulk-replacement semantics when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<SkillInput>>,
}
