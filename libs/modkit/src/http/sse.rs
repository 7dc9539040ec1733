use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::{borrow::Cow, convert::Infallible, time::Duration};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const KEEPALIVE_EVERY: Duration = Duration::from_secs(15);

/// Typed server-sent-events fan-out over `tokio::sync::broadcast`.
///
/// The channel is bounded: a subscriber that falls behind skips the
/// messages it missed instead of stalling senders.
#[derive(Clone)]
pub struct SseBroadcaster<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> SseBroadcaster<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn send(&self, value: T) {
        let _ = self.tx.send(value);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Typed stream of messages sent after this call; lag gaps are skipped.
    pub fn subscribe_stream(&self) -> impl Stream<Item = T> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|res| async move { res.ok() })
    }

    /// SSE response where every message is a JSON `data:` line under a fixed `event:` name.
    pub fn sse_response_named(
        &self,
        event_name: impl Into<Cow<'static, str>>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
    where
        T: Serialize,
    {
        let name = event_name.into();
        let stream = self.subscribe_stream().map(move |msg| {
            let ev = Event::default()
                .event(name.as_ref())
                .json_data(&msg)
                .unwrap_or_else(|_| Event::default().event(name.as_ref()).data("serialization_error"));
            Ok(ev)
        });
        Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEPALIVE_EVERY).text("keepalive"))
    }
}
