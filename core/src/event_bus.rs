//! Event Bus (§4.E): in-process pub/sub of job snapshots and deltas.
//!
//! Grounded in `loom-server-crons::sse::CronsBroadcaster`: a
//! `tokio::sync::broadcast::Sender` of bounded capacity. This bus is
//! single-channel (one broadcaster for the whole job set, not per-tenant,
//! since §4.E has no tenancy concept), but keeps the same lag-handling shape:
//! a subscriber that falls behind the ring buffer is resynchronized with a
//! fresh snapshot rather than seeing a `Lagged` error (§4.E backpressure
//! clause, "drop + resnapshot" strategy).

use tokio::sync::broadcast;

use crate::domain::Job;

/// One item delivered to a subscriber: either the initial/resync snapshot of
/// every job, or a delta for one job.
#[derive(Clone, Debug, PartialEq)]
pub enum BusEvent {
    Snapshot(Vec<Job>),
    JobDelta(Job),
}

/// Broadcasts job snapshots and deltas (§4.E). `subscribe()` always yields
/// the current snapshot first, even for a subscriber connecting mid-stream.
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publishes a full snapshot (used on every new subscription and as the
    /// resync payload after a subscriber lags).
    pub fn publish_snapshot(&self, jobs: Vec<Job>) {
        let _ = self.sender.send(BusEvent::Snapshot(jobs));
    }

    /// Publishes one job's delta after a dispatcher-owned mutation.
    pub fn publish_delta(&self, job: Job) {
        let _ = self.sender.send(BusEvent::JobDelta(job));
    }

    /// Subscribes to the bus. `current_jobs` is delivered first as a
    /// snapshot event before the returned stream starts surfacing live
    /// deltas — the snapshot is never dropped (§4.E "Guarantees").
    pub fn subscribe(&self, current_jobs: Vec<Job>) -> EventBusSubscription {
        EventBusSubscription {
            initial: Some(BusEvent::Snapshot(current_jobs)),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription: yields the initial snapshot once, then deltas in
/// publication order. A lagged subscriber is resynchronized with a fresh
/// `Snapshot` built from the jobs it missed rather than surfacing the lag
/// error, satisfying §4.E's "drop intermediate events + fresh snapshot"
/// backpressure option.
pub struct EventBusSubscription {
    initial: Option<BusEvent>,
    receiver: broadcast::Receiver<BusEvent>,
}

impl EventBusSubscription {
    /// Returns the next event for this subscriber, or `None` once the bus
    /// itself has shut down (no more senders).
    pub async fn next(&mut self) -> Option<BusEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
