use utoipa::OpenApi;

use super::{dto, handlers};
use modkit::api::problem::{Problem, ValidationError};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_profile,
        handlers::update_profile,
        handlers::add_experience,
        handlers::update_experience,
        handlers::delete_experience,
        handlers::add_education,
        handlers::update_education,
        handlers::delete_education,
        handlers::add_certification,
        handlers::update_certification,
        handlers::delete_certification,
        handlers::replace_skills,
        handlers::delete_skill,
        handlers::endorse_skill,
        handlers::upload_avatar,
        handlers::profile_events,
    ),
    components(schemas(
        dto::ProfileDto,
        dto::SkillDto,
        dto::ExperienceDto,
        dto::EducationDto,
        dto::CertificationDto,
        dto::SocialsDto,
        dto::UpdateProfileReq,
        dto::SkillItem,
        dto::SkillObject,
        dto::SkillsReq,
        dto::CreateExperienceReq,
        dto::UpdateExperienceReq,
        dto::CreateEducationReq,
        dto::UpdateEducationReq,
        dto::CreateCertificationReq,
        dto::UpdateCertificationReq,
        dto::AvatarUploadDto,
        dto::AvatarUploadForm,
        dto::ProfileEvent,
        Problem,
        ValidationError,
    )),
    tags((name = "profile", description = "Single-owner profile document"))
)]
pub struct ProfileApiDoc;

/// Paths of [`ProfileApiDoc`] mounted under `prefix`.
pub fn document(prefix: &str) -> utoipa::openapi::OpenApi {
    let doc = ProfileApiDoc::openapi();
    if prefix.is_empty() {
        doc
    } else {
        utoipa::openapi::OpenApiBuilder::new().build().nest(prefix, doc)
    }
}
