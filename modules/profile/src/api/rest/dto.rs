use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::contract::model::{
    Certification, CertificationPatch, Education, EducationPatch, Experience, ExperiencePatch,
    NewCertification, NewEducation, NewExperience, Profile, ProfilePatch, Skill, SkillInput,
    Socials,
};

/// REST DTO for the profile aggregate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    #[serde(rename = "_id")]
    pub key: String,
    pub name: String,
    pub title: String,
    pub bio: String,
    pub email: String,
    pub location: String,
    pub image: String,
    pub avatar_url: String,
    pub skills: Vec<SkillDto>,
    pub experience: Vec<ExperienceDto>,
    pub education: Vec<EducationDto>,
    pub certifications: Vec<CertificationDto>,
    pub socials: SocialsDto,
    /// Monotonic snapshot version; relay subscribers drop older snapshots.
    pub version: i64,
    #[schema(format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkillDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub endorsements: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub role: String,
    pub company: String,
    pub location: String,
    pub join_date: String,
    pub leave_date: String,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EducationDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub college: String,
    pub degree: String,
    pub field: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificationDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub certificate_url: String,
    pub certificate_id: String,
    pub issued_date: String,
    pub expiry_date: String,
    pub description: String,
}

/// Social links by platform; empty or absent means "not set".
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SocialsDto {
    pub github: String,
    pub linkedin: String,
    pub instagram: String,
}

/// REST DTO for the top-level merge (`PUT /profile/{id}`).
///
/// Clients commonly send the whole document back; fields outside this set
/// (`_id`, `experience`, `version`, ...) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileReq {
    pub name: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub avatar_url: Option<String>,
    pub socials: Option<SocialsDto>,
    /// Replaces the skill list, keeping endorsements of retained names.
    pub skills: Option<Vec<SkillItem>>,
}

/// A skill given either as a bare name or as an object with a `name`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SkillItem {
    Name(String),
    Object(SkillObject),
}

/// Extra fields such as `_id` or `endorsements` are accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkillObject {
    pub name: String,
}

/// Body of `POST /profile/skills`: one skill or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SkillsReq {
    Many(Vec<SkillItem>),
    One(SkillItem),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateExperienceReq {
    pub role: String,
    pub company: String,
    pub location: String,
    pub join_date: String,
    pub leave_date: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperienceReq {
    pub role: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub join_date: Option<String>,
    pub leave_date: Option<String>,
    pub current: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateEducationReq {
    pub college: String,
    pub degree: String,
    pub field: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEducationReq {
    pub college: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_current: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCertificationReq {
    pub name: String,
    pub provider: String,
    pub certificate_url: String,
    pub certificate_id: String,
    pub issued_date: String,
    pub expiry_date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCertificationReq {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub certificate_url: Option<String>,
    pub certificate_id: Option<String>,
    pub issued_date: Option<String>,
    pub expiry_date: Option<String>,
    pub description: Option<String>,
}

/// Response of `POST /profile/upload-avatar`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarUploadDto {
    pub url: String,
}

/// Multipart body of `POST /profile/upload-avatar` (documentation only).
#[derive(ToSchema)]
pub struct AvatarUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub avatar: Vec<u8>,
}

/// Transport-level SSE payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(title = "ProfileEvent", description = "Server-sent profile event")]
pub struct ProfileEvent {
    pub kind: String,
    pub key: String,
    pub version: i64,
    #[schema(format = "date-time")]
    pub at: DateTime<Utc>,
}

impl From<&crate::domain::events::ProfileDomainEvent> for ProfileEvent {
    fn from(e: &crate::domain::events::ProfileDomainEvent) -> Self {
        use crate::domain::events::ProfileDomainEvent::*;
        match e {
            Created { key, version, at } => Self {
                kind: "created".into(),
                key: key.clone(),
                version: *version,
                at: *at,
            },
            Changed { key, version, at } => Self {
                kind: "changed".into(),
                key: key.clone(),
                version: *version,
                at: *at,
            },
        }
    }
}

// Conversion implementations between REST DTOs and contract models

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        Self {
            key: p.key,
            name: p.name,
            title: p.title,
            bio: p.bio,
            email: p.email,
            location: p.location,
            image: p.image,
            avatar_url: p.avatar_url,
            skills: p.skills.into_iter().map(Into::into).collect(),
            experience: p.experience.into_iter().map(Into::into).collect(),
            education: p.education.into_iter().map(Into::into).collect(),
            certifications: p.certifications.into_iter().map(Into::into).collect(),
            socials: p.socials.into(),
            version: p.version,
            updated_at: p.updated_at,
        }
    }
}

impl From<Skill> for SkillDto {
    fn from(s: Skill) -> Self {
        Self {
            id: s.id,
            name: s.name,
            endorsements: s.endorsements,
        }
    }
}

impl From<Experience> for ExperienceDto {
    fn from(e: Experience) -> Self {
        Self {
            id: e.id,
            role: e.role,
            company: e.company,
            location: e.location,
            join_date: e.join_date,
            leave_date: e.leave_date,
            current: e.current,
        }
    }
}

impl From<Education> for EducationDto {
    fn from(e: Education) -> Self {
        Self {
            id: e.id,
            college: e.college,
            degree: e.degree,
            field: e.field,
            location: e.location,
            start_date: e.start_date,
            end_date: e.end_date,
            is_current: e.is_current,
        }
    }
}

impl From<Certification> for CertificationDto {
    fn from(c: Certification) -> Self {
        Self {
            id: c.id,
            name: c.name,
            provider: c.provider,
            certificate_url: c.certificate_url,
            certificate_id: c.certificate_id,
            issued_date: c.issued_date,
            expiry_date: c.expiry_date,
            description: c.description,
        }
    }
}

impl From<Socials> for SocialsDto {
    fn from(s: Socials) -> Self {
        Self {
            github: s.github,
            linkedin: s.linkedin,
            instagram: s.instagram,
        }
    }
}

impl From<SocialsDto> for Socials {
    fn from(s: SocialsDto) -> Self {
        Self {
            github: s.github,
            linkedin: s.linkedin,
            instagram: s.instagram,
        }
    }
}

impl From<SkillItem> for SkillInput {
    fn from(item: SkillItem) -> Self {
        match item {
            SkillItem::Name(name) => Self { name },
            SkillItem::Object(SkillObject { name }) => Self { name },
        }
    }
}

impl From<SkillsReq> for Vec<SkillInput> {
    fn from(req: SkillsReq) -> Self {
        match req {
            SkillsReq::Many(items) => items.into_iter().map(Into::into).collect(),
            SkillsReq::One(item) => vec![item.into()],
        }
    }
}

impl From<UpdateProfileReq> for ProfilePatch {
    fn from(req: UpdateProfileReq) -> Self {
        Self {
            name: req.name,
            title: req.title,
            bio: req.bio,
            email: req.email,
            location: req.location,
            image: req.image,
            avatar_url: req.avatar_url,
            socials: req.socials.map(Into::into),
            skills: req
                .skills
                .map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<CreateExperienceReq> for NewExperience {
    fn from(r: CreateExperienceReq) -> Self {
        Self {
            role: r.role,
            company: r.company,
            location: r.location,
            join_date: r.join_date,
            leave_date: r.leave_date,
            current: r.current,
        }
    }
}

impl From<UpdateExperienceReq> for ExperiencePatch {
    fn from(r: UpdateExperienceReq) -> Self {
        Self {
            role: r.role,
            company: r.company,
            location: r.location,
            join_date: r.join_date,
            leave_date: r.leave_date,
            current: r.current,
        }
    }
}

impl From<CreateEducationReq> for NewEducation {
    fn from(r: CreateEducationReq) -> Self {
        Self {
            college: r.college,
            degree: r.degree,
            field: r.field,
            location: r.location,
            start_date: r.start_date,
            end_date: r.end_date,
            is_current: r.is_current,
        }
    }
}

impl From<UpdateEducationReq> for EducationPatch {
    fn from(r: UpdateEducationReq) -> Self {
        Self {
            college: r.college,
            degree: r.degree,
            field: r.field,
            location: r.location,
            start_date: r.start_date,
            end_date: r.end_date,
            is_current: r.is_current,
        }
    }
}

impl From<CreateCertificationReq> for NewCertification {
    fn from(r: CreateCertificationReq) -> Self {
        Self {
            name: r.name,
            provider: r.provider,
            certificate_url: r.certificate_url,
            certificate_id: r.certificate_id,
            issued_date: r.issued_date,
            expiry_date: r.expiry_date,
            description: r.description,
        }
    }
}

impl From<UpdateCertificationReq> for CertificationPatch {
    fn from(r: UpdateCertificationReq) -> Self {
        Self {
            name: r.name,
            provider: r.provider,
            certificate_url: r.certificate_url,
            certificate_id: r.certificate_id,
            issued_date: r.issued_date,
            expiry_date: r.expiry_date,
            description: r.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ProfileDomainEvent;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn maps_domain_event_to_transport() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ev = ProfileEvent::from(&ProfileDomainEvent::Changed {
            key: "demo".into(),
            version: 3,
            at,
        });
        assert_eq!(ev.kind, "changed");
        assert_eq!(ev.version, 3);
        assert_eq!(ev.at, at);
    }

    #[test]
    fn skills_body_accepts_every_shape() {
        let names = |v: serde_json::Value| -> Vec<String> {
            let req: SkillsReq = serde_json::from_value(v).unwrap();
            Vec::<SkillInput>::from(req).into_iter().map(|s| s.name).collect()
        };
        assert_eq!(names(json!("Rust")), ["Rust"]);
        assert_eq!(names(json!({ "name": "Go", "endorsements": 9 })), ["Go"]);
        assert_eq!(names(json!(["Rust", { "name": "Go" }])), ["Rust", "Go"]);
    }

    #[test]
    fn full_document_put_only_merges_known_fields() {
        let body = json!({
            "_id": "demo",
            "__v": 0,
            "name": "Ada",
            "experience": [{ "role": "ignored" }],
            "socials": { "github": "https://github.com/ada" },
            "skills": [{ "_id": "x", "name": "React", "endorsements": 99 }]
        });
        let req: UpdateProfileReq = serde_json::from_value(body).unwrap();
        let patch = ProfilePatch::from(req);
        assert_eq!(patch.name.as_deref(), Some("Ada"));
        assert_eq!(patch.title, None);
        assert_eq!(patch.socials.unwrap().github, "https://github.com/ada");
        assert_eq!(patch.skills.unwrap(), [SkillInput::from("React")]);
    }

    #[test]
    fn unknown_social_platform_is_rejected() {
        let res: Result<UpdateProfileReq, _> =
            serde_json::from_value(json!({ "socials": { "myspace": "x" } }));
        assert!(res.is_err());
    }

    #[test]
    fn dto_and_contract_share_wire_shape() {
        let p = Profile {
            key: "demo".into(),
            name: "Ada".into(),
            skills: vec![Skill {
                id: Uuid::new_v4(),
                name: "Rust".into(),
                endorsements: 2,
            }],
            education: vec![Education {
                id: Uuid::new_v4(),
                college: "MIT".into(),
                degree: "BS".into(),
                field: "CS".into(),
                location: "Boston".into(),
                start_date: "2020-01-01".into(),
                end_date: String::new(),
                is_current: true,
            }],
            certifications: vec![Certification {
                id: Uuid::new_v4(),
                name: "CKA".into(),
                provider: "CNCF".into(),
                certificate_url: String::new(),
                certificate_id: "42".into(),
                issued_date: "2023-05".into(),
                expiry_date: String::new(),
                description: String::new(),
            }],
            version: 4,
            ..Default::default()
        };
        let via_dto = serde_json::to_value(ProfileDto::from(p.clone())).unwrap();
        let via_model = serde_json::to_value(&p).unwrap();
        assert_eq!(via_dto, via_model);
    }
}
