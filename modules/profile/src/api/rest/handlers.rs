use std::sync::Arc;

use axum::{
    extract::{Multipart, Path},
    response::{IntoResponse, Json},
    Extension,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::rest::dto::{
    AvatarUploadDto, AvatarUploadForm, CreateCertificationReq, CreateEducationReq,
    CreateExperienceReq, ProfileDto, ProfileEvent, SkillsReq, UpdateCertificationReq,
    UpdateEducationReq, UpdateExperienceReq, UpdateProfileReq,
};
use crate::api::rest::error::{bad_multipart, map_domain_error, missing_file, ProblemCtx};
use crate::contract::model::{Collection, EntryPatch, NewEntry, Profile};
use crate::domain::error::DomainError;
use crate::domain::service::Service;
use modkit::{api::problem::Problem, api::problem::ProblemResponse, SseBroadcaster};

type ProfileReply = Result<Json<ProfileDto>, ProblemResponse>;

fn reply(op: &str, res: Result<Profile, DomainError>, ctx: &ProblemCtx) -> ProfileReply {
    match res {
        Ok(profile) => Ok(Json(ProfileDto::from(profile))),
        Err(e) => {
            error!("Failed to {}: {}", op, e);
            Err(map_domain_error(&e, ctx))
        }
    }
}

/// Get the profile, creating it with defaults on first read
#[utoipa::path(
    get,
    path = "/profile/{id}",
    tag = "profile",
    operation_id = "profile.get_profile",
    params(("id" = String, Path, description = "Profile key")),
    responses(
        (status = 200, description = "Profile", body = ProfileDto),
        (status = 404, description = "Unknown profile key", body = Problem, content_type = "application/problem+json"),
        (status = 500, description = "Internal Server Error", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn get_profile(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    ctx: ProblemCtx,
) -> ProfileReply {
    info!("Getting profile {}", id);
    let res = match svc.ensure_key(&id) {
        Ok(()) => svc.get_or_create().await,
        Err(e) => Err(e),
    };
    reply("get profile", res, &ctx)
}

/// Merge top-level fields into the profile
#[utoipa::path(
    put,
    path = "/profile/{id}",
    tag = "profile",
    operation_id = "profile.update_profile",
    params(("id" = String, Path, description = "Profile key")),
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Merged profile", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Unknown profile key", body = Problem, content_type = "application/problem+json"),
        (status = 500, description = "Internal Server Error", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn update_profile(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    ctx: ProblemCtx,
    Json(req_body): Json<UpdateProfileReq>,
) -> ProfileReply {
    info!("Updating profile {}", id);
    let res = match svc.ensure_key(&id) {
        Ok(()) => svc.replace(req_body.into()).await,
        Err(e) => Err(e),
    };
    reply("update profile", res, &ctx)
}

/// Append an experience entry
#[utoipa::path(
    post,
    path = "/profile/experience",
    tag = "profile",
    operation_id = "profile.add_experience",
    request_body = CreateExperienceReq,
    responses(
        (status = 200, description = "Profile with the entry appended", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn add_experience(
    Extension(svc): Extension<Arc<Service>>,
    ctx: ProblemCtx,
    Json(req_body): Json<CreateExperienceReq>,
) -> ProfileReply {
    let res = svc
        .add_nested_item(NewEntry::Experience(req_body.into()))
        .await;
    reply("add experience", res, &ctx)
}

/// Patch an experience entry
#[utoipa::path(
    put,
    path = "/profile/experience/{id}",
    tag = "profile",
    operation_id = "profile.update_experience",
    params(("id" = Uuid, Path, description = "Entry id")),
    request_body = UpdateExperienceReq,
    responses(
        (status = 200, description = "Profile with the entry patched", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile or entry not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn update_experience(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
    Json(req_body): Json<UpdateExperienceReq>,
) -> ProfileReply {
    let res = svc
        .update_nested_item(id, EntryPatch::Experience(req_body.into()))
        .await;
    reply("update experience", res, &ctx)
}

/// Remove an experience entry (no-op for unknown ids)
#[utoipa::path(
    delete,
    path = "/profile/experience/{id}",
    tag = "profile",
    operation_id = "profile.delete_experience",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Profile without the entry", body = ProfileDto),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn delete_experience(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
) -> ProfileReply {
    let res = svc.remove_nested_item(Collection::Experience, id).await;
    reply("delete experience", res, &ctx)
}

/// Prepend an education entry
#[utoipa::path(
    post,
    path = "/profile/education",
    tag = "profile",
    operation_id = "profile.add_education",
    request_body = CreateEducationReq,
    responses(
        (status = 200, description = "Profile with the entry first", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn add_education(
    Extension(svc): Extension<Arc<Service>>,
    ctx: ProblemCtx,
    Json(req_body): Json<CreateEducationReq>,
) -> ProfileReply {
    let res = svc
        .add_nested_item(NewEntry::Education(req_body.into()))
        .await;
    reply("add education", res, &ctx)
}

#[utoipa::path(
    put,
    path = "/profile/education/{id}",
    tag = "profile",
    operation_id = "profile.update_education",
    params(("id" = Uuid, Path, description = "Entry id")),
    request_body = UpdateEducationReq,
    responses(
        (status = 200, description = "Profile with the entry patched", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile or entry not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn update_education(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
    Json(req_body): Json<UpdateEducationReq>,
) -> ProfileReply {
    let res = svc
        .update_nested_item(id, EntryPatch::Education(req_body.into()))
        .await;
    reply("update education", res, &ctx)
}

#[utoipa::path(
    delete,
    path = "/profile/education/{id}",
    tag = "profile",
    operation_id = "profile.delete_education",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Profile without the entry", body = ProfileDto),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn delete_education(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
) -> ProfileReply {
    let res = svc.remove_nested_item(Collection::Education, id).await;
    reply("delete education", res, &ctx)
}

/// Append a certification
#[utoipa::path(
    post,
    path = "/profile/certification",
    tag = "profile",
    operation_id = "profile.add_certification",
    request_body = CreateCertificationReq,
    responses(
        (status = 200, description = "Profile with the entry appended", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn add_certification(
    Extension(svc): Extension<Arc<Service>>,
    ctx: ProblemCtx,
    Json(req_body): Json<CreateCertificationReq>,
) -> ProfileReply {
    let res = svc
        .add_nested_item(NewEntry::Certification(req_body.into()))
        .await;
    reply("add certification", res, &ctx)
}

#[utoipa::path(
    put,
    path = "/profile/certification/{id}",
    tag = "profile",
    operation_id = "profile.update_certification",
    params(("id" = Uuid, Path, description = "Entry id")),
    request_body = UpdateCertificationReq,
    responses(
        (status = 200, description = "Profile with the entry patched", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile or entry not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn update_certification(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
    Json(req_body): Json<UpdateCertificationReq>,
) -> ProfileReply {
    let res = svc
        .update_nested_item(id, EntryPatch::Certification(req_body.into()))
        .await;
    reply("update certification", res, &ctx)
}

#[utoipa::path(
    delete,
    path = "/profile/certification/{id}",
    tag = "profile",
    operation_id = "profile.delete_certification",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Profile without the entry", body = ProfileDto),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn delete_certification(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    ctx: ProblemCtx,
) -> ProfileReply {
    let res = svc.remove_nested_item(Collection::Certifications, id).await;
    reply("delete certification", res, &ctx)
}

/// Replace the skill list, carrying endorsements over by name
#[utoipa::path(
    post,
    path = "/profile/skills",
    tag = "profile",
    operation_id = "profile.replace_skills",
    request_body = SkillsReq,
    responses(
        (status = 200, description = "Profile with the new skill list", body = ProfileDto),
        (status = 400, description = "Validation error", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn replace_skills(
    Extension(svc): Extension<Arc<Service>>,
    ctx: ProblemCtx,
    Json(req_body): Json<SkillsReq>,
) -> ProfileReply {
    let res = svc.replace_skills(req_body.into()).await;
    reply("replace skills", res, &ctx)
}

#[utoipa::path(
    delete,
    path = "/profile/skills/{name}",
    tag = "profile",
    operation_id = "profile.delete_skill",
    params(("name" = String, Path, description = "Skill name (case-insensitive)")),
    responses(
        (status = 200, description = "Profile without the skill", body = ProfileDto),
        (status = 404, description = "Profile not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn delete_skill(
    Extension(svc): Extension<Arc<Service>>,
    Path(name): Path<String>,
    ctx: ProblemCtx,
) -> ProfileReply {
    let res = svc.remove_skill(&name).await;
    reply("delete skill", res, &ctx)
}

/// Add one endorsement to a skill
#[utoipa::path(
    post,
    path = "/profile/endorse/{skillName}",
    tag = "profile",
    operation_id = "profile.endorse_skill",
    params(("skillName" = String, Path, description = "Exact skill name")),
    responses(
        (status = 200, description = "Profile with the count incremented", body = ProfileDto),
        (status = 404, description = "Profile or skill not found", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn endorse_skill(
    Extension(svc): Extension<Arc<Service>>,
    Path(skill_name): Path<String>,
    ctx: ProblemCtx,
) -> ProfileReply {
    info!("Endorsing skill {}", skill_name);
    let res = svc.endorse_skill(&skill_name).await;
    reply("endorse skill", res, &ctx)
}

/// Store an avatar image and return its URL
#[utoipa::path(
    post,
    path = "/profile/upload-avatar",
    tag = "profile",
    operation_id = "profile.upload_avatar",
    request_body(content = AvatarUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored file URL", body = AvatarUploadDto),
        (status = 400, description = "No file or file rejected", body = Problem, content_type = "application/problem+json")
    )
)]
pub async fn upload_avatar(
    Extension(svc): Extension<Arc<Service>>,
    ctx: ProblemCtx,
    mut multipart: Multipart,
) -> Result<Json<AvatarUploadDto>, ProblemResponse> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(missing_file(&ctx)),
            Err(e) => return Err(bad_multipart(e.body_text(), &ctx)),
        };
        if field.name() != Some("avatar") {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_multipart(e.body_text(), &ctx))?;

        return match svc.upload_avatar(file_name.as_deref(), &bytes).await {
            Ok(url) => Ok(Json(AvatarUploadDto { url })),
            Err(e) => {
                error!("Failed to upload avatar: {}", e);
                Err(map_domain_error(&e, &ctx))
            }
        };
    }
}

/// SSE endpoint returning a live stream of `ProfileEvent`.
#[utoipa::path(
    get,
    path = "/profile/events",
    tag = "profile",
    operation_id = "profile.events",
    responses(
        (status = 200, description = "SSE stream of ProfileEvent", body = ProfileEvent, content_type = "text/event-stream")
    )
)]
pub async fn profile_events(
    Extension(sse): Extension<SseBroadcaster<ProfileEvent>>,
) -> impl IntoResponse {
    info!("New SSE connection for profile events");
    sse.sse_response_named("profile_event")
}
