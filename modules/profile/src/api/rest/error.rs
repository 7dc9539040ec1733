use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::http::StatusCode;
use modkit::api::problem::{Problem, ProblemResponse, ValidationError};
use std::convert::Infallible;

use crate::domain::error::DomainError;

/// Where a problem happened: request path and the `x-request-id` header.
#[derive(Debug, Clone, Default)]
pub struct ProblemCtx {
    pub instance: String,
    pub request_id: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ProblemCtx {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // nested routers see the path without their prefix
        let path = match parts.extensions.get::<OriginalUri>() {
            Some(OriginalUri(uri)) => uri.path(),
            None => parts.uri.path(),
        };
        Ok(Self {
            instance: path.to_owned(),
            request_id: parts
                .headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        })
    }
}

/// Helper to create a ProblemResponse with less boilerplate
pub fn from_parts(
    status: StatusCode,
    code: &str,
    title: &str,
    detail: impl Into<String>,
    ctx: &ProblemCtx,
) -> ProblemResponse {
    let problem = Problem::new(status, detail)
        .with_title(title)
        .with_code(code)
        .with_instance(ctx.instance.clone())
        .with_request_id(ctx.request_id.clone());
    ProblemResponse(problem)
}

/// Map domain error to RFC9457 ProblemResponse
pub fn map_domain_error(e: &DomainError, ctx: &ProblemCtx) -> ProblemResponse {
    match e {
        DomainError::ProfileNotFound { key } => from_parts(
            StatusCode::NOT_FOUND,
            "PROFILE_NOT_FOUND",
            "Profile not found",
            format!("Profile '{key}' was not found"),
            ctx,
        ),
        DomainError::EntryNotFound { collection, id } => from_parts(
            StatusCode::NOT_FOUND,
            "PROFILE_ENTRY_NOT_FOUND",
            "Entry not found",
            format!("No {collection} entry with id {id}"),
            ctx,
        ),
        DomainError::SkillNotFound { name } => from_parts(
            StatusCode::NOT_FOUND,
            "PROFILE_SKILL_NOT_FOUND",
            "Skill not found",
            format!("Skill '{name}' was not found"),
            ctx,
        ),
        DomainError::Validation { field, message } => {
            let mut resp = from_parts(
                StatusCode::BAD_REQUEST,
                "PROFILE_VALIDATION",
                "Validation error",
                format!("{e}"),
                ctx,
            );
            resp.0 = resp.0.with_errors(vec![ValidationError {
                detail: message.clone(),
                pointer: format!("/{}", field.replace('.', "/")),
            }]);
            resp
        }
        DomainError::Upload { message } => from_parts(
            StatusCode::BAD_REQUEST,
            "PROFILE_UPLOAD_FAILED",
            "Upload rejected",
            message.clone(),
            ctx,
        ),
        DomainError::Database { .. } => {
            // Log the internal error details but don't expose them to the client
            tracing::error!(error = ?e, "Database error occurred");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROFILE_UPSTREAM",
                "Internal error",
                "The profile store is unavailable",
                ctx,
            )
        }
        DomainError::Storage { .. } => {
            tracing::error!(error = ?e, "File storage error occurred");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROFILE_UPLOAD_FAILED",
                "Internal error",
                "The uploaded file could not be stored",
                ctx,
            )
        }
    }
}

/// `POST /profile/upload-avatar` without an `avatar` part.
pub fn missing_file(ctx: &ProblemCtx) -> ProblemResponse {
    from_parts(
        StatusCode::BAD_REQUEST,
        "PROFILE_UPLOAD_MISSING_FILE",
        "Bad request",
        "No file uploaded",
        ctx,
    )
}

/// Unreadable multipart body.
pub fn bad_multipart(detail: impl Into<String>, ctx: &ProblemCtx) -> ProblemResponse {
    from_parts(
        StatusCode::BAD_REQUEST,
        "PROFILE_UPLOAD_FAILED",
        "Bad request",
        detail,
        ctx,
    )
}
