use thiserror::Error;
use uuid::Uuid;

use crate::contract::model::Collection;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Profile not found: {key}")]
    ProfileNotFound { key: String },

    #[error("No {collection} entry with id {id}")]
    EntryNotFound { collection: Collection, id: Uuid },

    #[error("Skill not found: {name}")]
    SkillNotFound { name: String },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Upload rejected: {message}")]
    Upload { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("File storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn profile_not_found(key: impl Into<String>) -> Self {
        Self::ProfileNotFound { key: key.into() }
    }

    pub fn entry_not_found(collection: Collection, id: Uuid) -> Self {
        Self::EntryNotFound { collection, id }
    }

    pub fn skill_not_found(name: impl Into<String>) -> Self {
        Self::SkillNotFound { name: name.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
