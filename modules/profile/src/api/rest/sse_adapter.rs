use modkit::SseBroadcaster;

use crate::domain::{events::ProfileDomainEvent, ports::EventPublisher};

use super::dto::ProfileEvent;

/// Adapter: implements domain port and forwards events into SSE broadcaster.
pub struct SseProfileEventPublisher {
    out: SseBroadcaster<ProfileEvent>,
}

impl SseProfileEventPublisher {
    pub fn new(out: SseBroadcaster<ProfileEvent>) -> Self {
        Self { out }
    }
}

impl EventPublisher<ProfileDomainEvent> for SseProfileEventPublisher {
    fn publish(&self, event: &ProfileDomainEvent) {
        self.out.send(ProfileEvent::from(event));
    }
}
