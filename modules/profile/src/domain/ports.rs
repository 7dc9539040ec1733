use async_trait::async_trait;

use crate::domain::error::DomainError;

/// Output port: publish domain events (no knowledge of transport).
pub trait EventPublisher<E>: Send + Sync + 'static {
    fn publish(&self, event: &E);
}

/// Output port: persist avatar bytes somewhere a browser can fetch them.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Stores `bytes` and returns the public URL path of the stored file.
    /// `original_name` only contributes its extension.
    async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, DomainError>;
}
