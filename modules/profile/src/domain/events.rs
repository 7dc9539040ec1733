use chrono::{DateTime, Utc};

/// Transport-agnostic domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileDomainEvent {
    Created {
        key: String,
        version: i64,
        at: DateTime<Utc>,
    },
    Changed {
        key: String,
        version: i64,
        at: DateTime<Utc>,
    },
}

impl ProfileDomainEvent {
    pub fn version(&self) -> i64 {
        match self {
            Self::Created { version, .. } | Self::Changed { version, .. } => *version,
        }
    }
}
