//! SSE hub (C7): per-branch broadcast fan-out plus per-subscriber unicast,
//! with refcounted teardown of idle branches and a 15s idle keep-alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::event::SseEvent;

const BROADCAST_CAPACITY: usize = 256;
const KEEPALIVE: Duration = Duration::from_secs(15);

struct BranchEntry {
    tx: broadcast::Sender<SseEvent>,
    refcount: usize,
}

/// Process-wide SSE hub, shared behind an `Arc` by the HTTP surface and the
/// Turn engine.
#[derive(Default)]
pub struct SseHub {
    branches: DashMap<i64, BranchEntry>,
    subscribers: DashMap<u64, mpsc::UnboundedSender<SseEvent>>,
    next_id: AtomicU64,
}

impl SseHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber to `branch_id`, incrementing the branch's
    /// refcount. Events broadcast to the branch from this point onward (plus
    /// any events unicast directly to this subscriber) are visible via
    /// `Subscriber::recv`.
    pub fn attach(self: &Arc<Self>, branch_id: i64) -> Subscriber {
        let mut entry = self
            .branches
            .entry(branch_id)
            .or_insert_with(|| BranchEntry { tx: broadcast::channel(BROADCAST_CAPACITY).0, refcount: 0 });
        entry.refcount += 1;
        let broadcast_rx = entry.tx.subscribe();
        drop(entry);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (unicast_tx, unicast_rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, unicast_tx);

        Subscriber { id, branch_id, unicast_rx, broadcast_rx, hub: self.clone() }
    }

    /// Fan an event out to every current subscriber of `branch_id`. A
    /// missing branch (no attached subscribers) is a silent no-op.
    pub fn broadcast(&self, branch_id: i64, event: SseEvent) {
        if let Some(entry) = self.branches.get(&branch_id) {
            let _ = entry.tx.send(event);
        }
    }

    /// Unicast an event to exactly one subscriber (workspace-hint, initial
    /// state on attach). A subscriber that has already detached is a silent
    /// no-op.
    pub fn send(&self, subscriber_id: u64, event: SseEvent) {
        if let Some(tx) = self.subscribers.get(&subscriber_id) {
            let _ = tx.send(event);
        }
    }

    fn release(&self, subscriber_id: u64, branch_id: i64) {
        self.subscribers.remove(&subscriber_id);
        if let Some(mut entry) = self.branches.get_mut(&branch_id) {
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount == 0 {
                drop(entry);
                self.branches.remove(&branch_id);
            }
        }
    }
}

/// A live attachment to one branch's event stream. Dropping it releases the
/// branch refcount and unregisters the unicast route.
pub struct Subscriber {
    pub id: u64,
    pub branch_id: i64,
    unicast_rx: mpsc::UnboundedReceiver<SseEvent>,
    broadcast_rx: broadcast::Receiver<SseEvent>,
    hub: Arc<SseHub>,
}

impl Subscriber {
    /// Wait for the next event, or a keep-alive ping after 15s of idleness.
    /// A lagged broadcast receiver (slow consumer) resumes from the next
    /// available event rather than erroring the stream.
    pub async fn recv(&mut self) -> SseEvent {
        loop {
            tokio::select! {
                biased;
                Some(event) = self.unicast_rx.recv() => return event,
                result = self.broadcast_rx.recv() => {
                    match result {
                        Ok(event) => return event,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return SseEvent::ping(),
                    }
                }
                _ = tokio::time::sleep(KEEPALIVE) => return SseEvent::ping(),
            }
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.hub.release(self.id, self.branch_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    #[tokio::test]
    async fn broadcast_reaches_all_attached_subscribers() {
        let hub = Arc::new(SseHub::new());
        let mut a = hub.attach(1);
        let mut b = hub.attach(1);
        hub.broadcast(1, SseEvent::new(EventType::ModelText, "1\nhi"));
        assert_eq!(a.recv().await.ty, EventType::ModelText);
        assert_eq!(b.recv().await.ty, EventType::ModelText);
    }

    #[tokio::test]
    async fn unicast_reaches_only_its_subscriber() {
        let hub = Arc::new(SseHub::new());
        let mut a = hub.attach(1);
        let mut b = hub.attach(1);
        hub.send(a.id, SseEvent::empty(EventType::WorkspaceHint));
        hub.send(b.id, SseEvent::empty(EventType::Ack));
        assert_eq!(a.recv().await.ty, EventType::WorkspaceHint);
        assert_eq!(b.recv().await.ty, EventType::Ack);
    }

    #[tokio::test]
    async fn branch_entry_is_pruned_once_last_subscriber_drops() {
        let hub = Arc::new(SseHub::new());
        let sub = hub.attach(7);
        assert!(hub.branches.contains_key(&7));
        drop(sub);
        assert!(!hub.branches.contains_key(&7));
    }

    #[tokio::test]
    async fn idle_subscriber_receives_keepalive_ping() {
        tokio::time::pause();
        let hub = Arc::new(SseHub::new());
        let mut sub = hub.attach(1);
        let handle = tokio::spawn(async move { sub.recv().await });
        tokio::time::advance(Duration::from_secs(16)).await;
        let event = handle.await.unwrap();
        assert_eq!(event.ty, EventType::Ping);
    }
}
