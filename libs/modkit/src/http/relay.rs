//! Connection-aware broadcast hub.
//!
//! Every connected client joins the hub and gets a [`RelayMember`]. A
//! message published by a member reaches every *other* member, in publish
//! order; the publisher never sees its own message. Nothing is persisted:
//! members only receive what is published while they are joined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

pub type ConnectionId = u64;

#[derive(Clone, Debug)]
struct Envelope<T> {
    origin: ConnectionId,
    payload: T,
}

struct Inner<T> {
    tx: broadcast::Sender<Envelope<T>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct RelayHub<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + 'static> RelayHub<T> {
    /// `capacity` bounds the per-member backlog; slower members skip ahead.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn join(&self) -> RelayMember<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        RelayMember {
            id,
            tx: self.inner.tx.clone(),
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Currently joined members.
    pub fn member_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

/// One joined connection. Dropping it leaves the hub.
pub struct RelayMember<T> {
    id: ConnectionId,
    tx: broadcast::Sender<Envelope<T>>,
    rx: broadcast::Receiver<Envelope<T>>,
}

impl<T: Clone + Send + 'static> RelayMember<T> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns how many other members were joined at send time.
    pub fn publish(&self, payload: T) -> usize {
        self.tx
            .send(Envelope {
                origin: self.id,
                payload,
            })
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0)
    }

    /// Next message from another member. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(env) if env.origin == self.id => continue,
                Ok(env) => return Some(env.payload),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(member = self.id, skipped, "relay member lagged; skipping");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
