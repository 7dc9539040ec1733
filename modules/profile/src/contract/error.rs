use thiserror::Error;
use uuid::Uuid;

use super::model::Collection;

/// Errors that are safe to expose to other modules and remote callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Profile not found: {key}")]
    NotFound { key: String },

    #[error("No {collection} entry with id {id}")]
    EntryNotFound { collection: Collection, id: Uuid },

    #[error("Skill not found: {name}")]
    SkillNotFound { name: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Profile store unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Internal error")]
    Internal,
}

impl ProfileError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }

    /// Any of the not-found flavours.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::EntryNotFound { .. } | Self::SkillNotFound { .. }
        )
    }
}

impl From<crate::domain::error::DomainError> for ProfileError {
    fn from(domain_error: crate::domain::error::DomainError) -> Self {
        use crate::domain::error::DomainError::*;
        match domain_error {
            ProfileNotFound { key } => Self::not_found(key),
            EntryNotFound { collection, id } => Self::EntryNotFound { collection, id },
            SkillNotFound { name } => Self::SkillNotFound { name },
            Validation { field, message } => Self::validation(format!("{field}: {message}")),
            Upload { message } => Self::validation(message),
            Database { message } => Self::upstream(message),
            Storage { .. } => Self::internal(),
        }
    }
}
