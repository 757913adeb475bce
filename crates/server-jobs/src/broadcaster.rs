//! Single-listener push channels keyed by job id.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::types::{JobId, ProgressEvent};

/// Identifies one registration so a replaced listener can't unregister its successor.
pub type ListenerId = u64;

struct Listener {
    id: ListenerId,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// Delivers progress events to at most one listener per job.
///
/// Sends never wait: channels are unbounded and a missing or closed
/// listener just drops the event.
pub struct ProgressBroadcaster {
    next_id: AtomicU64,
    listeners: DashMap<JobId, Listener>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: DashMap::new(),
        }
    }

    /// Attach `tx` as the listener for `job_id`, replacing any previous one.
    ///
    /// The replaced sender is dropped, which ends the old receiver's stream.
    pub fn register(&self, job_id: &str, tx: mpsc::UnboundedSender<ProgressEvent>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.listeners.insert(job_id.to_string(), Listener { id, tx }) {
            tracing::debug!(
                job_id = %job_id,
                replaced = previous.id,
                listener = id,
                "Progress listener replaced"
            );
        }
        id
    }

    /// Create a channel and register its sending half.
    pub fn subscribe(
        &self,
        job_id: &str,
    ) -> (ListenerId, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.register(job_id, tx), rx)
    }

    /// Drop whatever listener is attached to `job_id`.
    pub fn unregister(&self, job_id: &str) -> bool {
        self.listeners.remove(job_id).is_some()
    }

    /// Drop the listener for `job_id` only if it is still `listener_id`.
    pub fn unregister_listener(&self, job_id: &str, listener_id: ListenerId) -> bool {
        self.listeners
            .remove_if(job_id, |_, listener| listener.id == listener_id)
            .is_some()
    }

    /// Deliver `event` to the job's listener. Returns whether it was handed off.
    pub fn publish(&self, job_id: &str, event: ProgressEvent) -> bool {
        let closed = match self.listeners.get(job_id) {
            Some(listener) => listener.tx.send(event).is_err(),
            None => return false,
        };

        if closed {
            // Receiver went away without unregistering.
            self.listeners
                .remove_if(job_id, |_, listener| listener.tx.is_closed());
            tracing::debug!(job_id = %job_id, "Dropped event for closed listener");
            return false;
        }
        true
    }

    pub fn is_registered(&self, job_id: &str) -> bool {
        self.listeners.contains_key(job_id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
